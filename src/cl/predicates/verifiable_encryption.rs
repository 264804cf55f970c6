use super::{response, Commitments, ProverContext, VerifierContext};
use crate::bn::BigNumber;
use crate::cl::encryption::{
    encrypt_with_randomness, encryption_t_values, reconstruct_encryption_t_values, VerifiableEncryption,
    VerifiableEncryptionPublicKey,
};
use crate::cl::helpers::bn_rand;
use crate::errors::prelude::*;

/// A hidden identifier is encrypted under `public_key` and `label`, openable by the key owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableEncryptionPredicate {
    pub name: String,
    pub identifier: String,
    pub public_key: VerifiableEncryptionPublicKey,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiableEncryptionProof {
    pub ciphertext: VerifiableEncryption,
    pub r_hat: BigNumber,
}

#[derive(Debug)]
pub(crate) struct VerifiableEncryptionProverState {
    ciphertext: VerifiableEncryption,
    r: BigNumber,
    r_tilde: BigNumber,
}

pub(crate) fn init(
    predicate: &VerifiableEncryptionPredicate,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, VerifiableEncryptionProverState)> {
    trace!(
        "VerifiableEncryptionPredicate::init: >>> name: {:?}, identifier: {:?}",
        predicate.name,
        predicate.identifier
    );

    let (m, m_tilde) = ctx.hidden(&predicate.identifier)?;
    let public_key = &predicate.public_key;
    let system = ctx.system();
    let label = predicate.label.as_bytes();

    let r = public_key.group.rand_for_enc()?;
    let ciphertext = encrypt_with_randomness(public_key, m, &r, label)?;

    let r_tilde = bn_rand(public_key.n.num_bits()? + system.l_phi + system.l_h)?;
    let t_values = encryption_t_values(public_key, &ciphertext, label, &r_tilde, m_tilde)?;

    let commitments = Commitments {
        t_values,
        common_values: vec![ciphertext.u.clone(), ciphertext.e.clone(), ciphertext.v.clone()],
    };

    trace!("VerifiableEncryptionPredicate::init: <<< commitments: {:?}", commitments);

    Ok((commitments, VerifiableEncryptionProverState { ciphertext, r, r_tilde }))
}

pub(crate) fn finalize(
    state: VerifiableEncryptionProverState,
    c: &BigNumber,
) -> UrsaCryptoResult<VerifiableEncryptionProof> {
    Ok(VerifiableEncryptionProof {
        r_hat: response(&state.r_tilde, c, &state.r)?,
        ciphertext: state.ciphertext,
    })
}

pub(crate) fn verify(
    predicate: &VerifiableEncryptionPredicate,
    proof: &VerifiableEncryptionProof,
    ctx: &VerifierContext,
) -> UrsaCryptoResult<Commitments> {
    trace!("VerifiableEncryptionPredicate::verify: >>> proof: {:?}", proof);

    let m_hat = ctx.hidden_response(&predicate.identifier)?;
    let ciphertext = &proof.ciphertext;

    let t_values = reconstruct_encryption_t_values(
        &predicate.public_key,
        ciphertext,
        predicate.label.as_bytes(),
        ctx.challenge,
        &proof.r_hat,
        m_hat,
    )?;

    Ok(Commitments {
        t_values,
        common_values: vec![ciphertext.u.clone(), ciphertext.e.clone(), ciphertext.v.clone()],
    })
}
