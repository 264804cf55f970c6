//! Camenisch–Shoup verifiable encryption of a single attribute.
//!
//! Based on "Practical Verifiable Encryption and Decryption of Discrete Logarithms",
//! section 3.2 for the scheme and section 5.2 for the proof of correct encryption.
use super::hash::get_hash_as_int;
use super::helpers::*;
use super::SystemParameters;
use crate::bn::{BigNumber, BigNumberContext, BIGNUMBER_1, BIGNUMBER_2};
use crate::errors::prelude::*;

use zeroize::Zeroize;

/// Subgroup of `Z*_{n²}` with `g` of order dividing `φ(n)/4` and `h = n + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaillierGroup {
    pub g: BigNumber,
    pub h: BigNumber,
    pub n_by_4: BigNumber,
    pub modulus: BigNumber,
}

impl PaillierGroup {
    pub fn new(n: &BigNumber, ctx: &mut BigNumberContext) -> UrsaCryptoResult<PaillierGroup> {
        let modulus = n.sqr(Some(ctx))?;
        let g_prime = modulus.rand_range()?;
        let g = g_prime.mod_exp(&n.lshift1()?, &modulus, Some(ctx))?;

        Ok(PaillierGroup {
            g,
            h: n.increment()?,
            n_by_4: n.rshift(2)?,
            modulus,
        })
    }

    pub fn exponentiate(
        &self,
        base: &BigNumber,
        exp: &BigNumber,
        ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        base.mod_exp(exp, &self.modulus, ctx)
    }

    pub fn rand_for_enc(&self) -> UrsaCryptoResult<BigNumber> {
        self.n_by_4.rand_range()
    }

    /// `modulus - a` when `a > modulus / 2`, else `a`.
    pub fn abs(&self, a: &BigNumber, ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        let a = a.modulus(&self.modulus, ctx)?;
        if a > self.modulus.rshift1()? {
            self.modulus.sub(&a)
        } else {
            Ok(a)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableEncryptionPublicKey {
    pub n: BigNumber,
    /// `2 * (2^-1 mod n)`
    pub two_inv_times_2: BigNumber,
    pub group: PaillierGroup,
    pub y1: BigNumber,
    pub y2: BigNumber,
    pub y3: BigNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiableEncryptionPrivateKey {
    x1: BigNumber,
    x2: BigNumber,
    x3: BigNumber,
}

impl Drop for VerifiableEncryptionPrivateKey {
    fn drop(&mut self) {
        self.x1.zeroize();
        self.x2.zeroize();
        self.x3.zeroize();
    }
}

/// Key pair of the trusted party able to open verifiable encryptions.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifiableEncryptionKeyPair {
    pub public_key: VerifiableEncryptionPublicKey,
    pub private_key: VerifiableEncryptionPrivateKey,
}

impl VerifiableEncryptionKeyPair {
    /// Generates a modulus of `l_n` bits from two safe primes.
    pub fn new(system: &SystemParameters) -> UrsaCryptoResult<VerifiableEncryptionKeyPair> {
        trace!("VerifiableEncryptionKeyPair::new: >>> l_n: {:?}", system.l_n);

        let mut ctx = BigNumber::new_context()?;

        let p_safe = generate_safe_prime(system.l_n / 2)?;
        let mut q_safe = generate_safe_prime(system.l_n / 2)?;
        while p_safe == q_safe {
            q_safe = generate_safe_prime(system.l_n / 2)?;
        }
        let n = p_safe.mul(&q_safe, Some(&mut ctx))?;

        let two_inv_times_2 = BIGNUMBER_2.inverse(&n, Some(&mut ctx))?.lshift1()?;
        let group = PaillierGroup::new(&n, &mut ctx)?;

        let n_sqr_by_4 = group.modulus.rshift(2)?;
        let x1 = n_sqr_by_4.rand_range()?;
        let x2 = n_sqr_by_4.rand_range()?;
        let x3 = n_sqr_by_4.rand_range()?;

        let y1 = group.exponentiate(&group.g, &x1, Some(&mut ctx))?;
        let y2 = group.exponentiate(&group.g, &x2, Some(&mut ctx))?;
        let y3 = group.exponentiate(&group.g, &x3, Some(&mut ctx))?;

        let key_pair = VerifiableEncryptionKeyPair {
            public_key: VerifiableEncryptionPublicKey {
                n,
                two_inv_times_2,
                group,
                y1,
                y2,
                y3,
            },
            private_key: VerifiableEncryptionPrivateKey { x1, x2, x3 },
        };

        trace!(
            "VerifiableEncryptionKeyPair::new: <<< public_key: {:?}",
            key_pair.public_key
        );

        Ok(key_pair)
    }
}

/// Ciphertext `(u, e, v)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableEncryption {
    pub u: BigNumber,
    pub e: BigNumber,
    pub v: BigNumber,
}

/// Encrypts `message` under `label` with fresh randomness.
pub fn encrypt(
    public_key: &VerifiableEncryptionPublicKey,
    message: &BigNumber,
    label: &[u8],
) -> UrsaCryptoResult<VerifiableEncryption> {
    let r = public_key.group.rand_for_enc()?;
    encrypt_with_randomness(public_key, message, &r, label)
}

pub(crate) fn encrypt_with_randomness(
    public_key: &VerifiableEncryptionPublicKey,
    message: &BigNumber,
    r: &BigNumber,
    label: &[u8],
) -> UrsaCryptoResult<VerifiableEncryption> {
    trace!(
        "Encryption::encrypt_with_randomness: >>> message: {:?}, label: {:?}",
        secret!(message),
        label
    );

    let group = &public_key.group;
    let mut ctx = BigNumber::new_context()?;

    let u = group.exponentiate(&group.g, r, Some(&mut ctx))?;
    let e = BigNumber::multi_mod_exp(&[(&public_key.y1, r), (&group.h, message)], &group.modulus, Some(&mut ctx))?;
    let hash = label_hash(&u, &e, label)?;
    let v = group.abs(&_y2_y3_hs(public_key, &hash)?.mod_exp(r, &group.modulus, Some(&mut ctx))?, None)?;

    let ciphertext = VerifiableEncryption { u, e, v };

    trace!("Encryption::encrypt_with_randomness: <<< ciphertext: {:?}", ciphertext);

    Ok(ciphertext)
}

/// Recovers the encrypted attribute. Fails unless `label` is the one used at encryption.
pub fn decrypt(
    key_pair: &VerifiableEncryptionKeyPair,
    label: &[u8],
    ciphertext: &VerifiableEncryption,
) -> UrsaCryptoResult<BigNumber> {
    trace!(
        "Encryption::decrypt: >>> ciphertext: {:?}, label: {:?}",
        ciphertext,
        label
    );

    let public_key = &key_pair.public_key;
    let private_key = &key_pair.private_key;
    let group = &public_key.group;
    let mut ctx = BigNumber::new_context()?;

    if ciphertext.v != group.abs(&ciphertext.v, Some(&mut ctx))? {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            "Ciphertext v is not in canonical form",
        ));
    }

    let hash = label_hash(&ciphertext.u, &ciphertext.e, label)?;
    let exp = hash.mul(&private_key.x3, Some(&mut ctx))?.add(&private_key.x2)?.lshift1()?;
    let u_exp = group.exponentiate(&ciphertext.u, &exp, Some(&mut ctx))?;
    let v_sqr = ciphertext.v.sqr(Some(&mut ctx))?.modulus(&group.modulus, Some(&mut ctx))?;
    if u_exp != v_sqr {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            "Ciphertext does not match its label",
        ));
    }

    let u_x1 = group.exponentiate(&ciphertext.u, &private_key.x1, Some(&mut ctx))?;
    let e_by_u_x1 = ciphertext.e.mod_div(&u_x1, &group.modulus, Some(&mut ctx))?;
    let m_hat = group.exponentiate(&e_by_u_x1, &public_key.two_inv_times_2, Some(&mut ctx))?;

    if m_hat.modulus(&public_key.n, Some(&mut ctx))? != *BIGNUMBER_1 {
        return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, "Decryption failed"));
    }

    let message = m_hat.decrement()?.div(&public_key.n, Some(&mut ctx))?;

    trace!("Encryption::decrypt: <<< message: {:?}", secret!(&message));

    Ok(message)
}

/// `H(u ‖ e ‖ label)`
pub(crate) fn label_hash(u: &BigNumber, e: &BigNumber, label: &[u8]) -> UrsaCryptoResult<BigNumber> {
    get_hash_as_int(&[u.to_bytes()?, e.to_bytes()?, label.to_vec()])
}

fn _y2_y3_hs(public_key: &VerifiableEncryptionPublicKey, hash: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    BigNumber::multi_mod_exp(
        &[(&public_key.y2, &*BIGNUMBER_1), (&public_key.y3, hash)],
        &public_key.group.modulus,
        None,
    )
}

/// Commitments `(g^2r̃, y1^2r̃ * h^2m̃, (y2 * y3^H)^2r̃)` of the encryption proof.
pub(crate) fn encryption_t_values(
    public_key: &VerifiableEncryptionPublicKey,
    ciphertext: &VerifiableEncryption,
    label: &[u8],
    r_tilde: &BigNumber,
    m_tilde: &BigNumber,
) -> UrsaCryptoResult<Vec<BigNumber>> {
    let group = &public_key.group;
    let mut ctx = BigNumber::new_context()?;

    let r_tilde = r_tilde.lshift1()?;
    let m_tilde = m_tilde.lshift1()?;
    let hash = label_hash(&ciphertext.u, &ciphertext.e, label)?;

    Ok(vec![
        group.exponentiate(&group.g, &r_tilde, Some(&mut ctx))?,
        BigNumber::multi_mod_exp(
            &[(&public_key.y1, &r_tilde), (&group.h, &m_tilde)],
            &group.modulus,
            Some(&mut ctx),
        )?,
        _y2_y3_hs(public_key, &hash)?.mod_exp(&r_tilde, &group.modulus, Some(&mut ctx))?,
    ])
}

/// Recomputes the commitments from responses: `u^-2c * g^2r̂`, `e^-2c * y1^2r̂ * h^2m̂`,
/// `v^-2c * (y2 * y3^H)^2r̂`. Fails with `ProofRejected` when `v` is not canonical.
pub(crate) fn reconstruct_encryption_t_values(
    public_key: &VerifiableEncryptionPublicKey,
    ciphertext: &VerifiableEncryption,
    label: &[u8],
    challenge: &BigNumber,
    r_hat: &BigNumber,
    m_hat: &BigNumber,
) -> UrsaCryptoResult<Vec<BigNumber>> {
    let group = &public_key.group;
    let mut ctx = BigNumber::new_context()?;

    if ciphertext.v != group.abs(&ciphertext.v, Some(&mut ctx))? {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            "Ciphertext v is not in canonical form",
        ));
    }

    let minus_2c = challenge.lshift1()?.set_negative(true)?;
    let r_hat = r_hat.lshift1()?;
    let m_hat = m_hat.lshift1()?;
    let hash = label_hash(&ciphertext.u, &ciphertext.e, label)?;
    let y2_y3_hs = _y2_y3_hs(public_key, &hash)?;

    Ok(vec![
        BigNumber::multi_mod_exp(
            &[(&ciphertext.u, &minus_2c), (&group.g, &r_hat)],
            &group.modulus,
            Some(&mut ctx),
        )?,
        BigNumber::multi_mod_exp(
            &[(&ciphertext.e, &minus_2c), (&public_key.y1, &r_hat), (&group.h, &m_hat)],
            &group.modulus,
            Some(&mut ctx),
        )?,
        BigNumber::multi_mod_exp(
            &[(&ciphertext.v, &minus_2c), (&y2_y3_hs, &r_hat)],
            &group.modulus,
            Some(&mut ctx),
        )?,
    ])
}
