use super::hash::{get_hash_as_int, ChallengeBuilder};
use super::helpers::*;
use super::recipient::IssuanceMessage1;
use super::*;
use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::collections::BTreeMap;

/// Issuer's answer to round 1: the signature on the blinded attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceMessage2 {
    pub a: BigNumber,
    pub e: BigNumber,
    pub v_prime_prime: BigNumber,
    pub proof: SignatureCorrectnessProof,
    pub nonce2: Nonce,
}

/// Proof that `A = Q^(1/e)` was computed with the issuer's private key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCorrectnessProof {
    pub c: BigNumber,
    pub se: BigNumber,
}

/// What an issuer keeps to re-sign an updatable credential later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerUpdateInformation {
    u: BigNumber,
    known_values: BTreeMap<String, BigNumber>,
    structure: CredentialStructure,
    nonce_counter: u64,
}

impl IssuerUpdateInformation {
    pub fn known_values(&self) -> &BTreeMap<String, BigNumber> {
        &self.known_values
    }

    /// Number of updates issued so far.
    pub fn nonce_counter(&self) -> u64 {
        self.nonce_counter
    }
}

/// Re-signed credential for new known attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMessage {
    pub a: BigNumber,
    pub e: BigNumber,
    pub v_prime_prime: BigNumber,
    pub proof: SignatureCorrectnessProof,
    pub nonce: Nonce,
}

impl IssuerKeyPair {
    /// Creates an issuer key supporting `attribute_count` attributes plus the master secret.
    ///
    /// # Arguments
    /// * `group` - group parameters the key is bound to
    /// * `attribute_count` - number of attribute bases `R[1..=attribute_count]`
    /// * `epoch_length` - optional epoch length in seconds
    ///
    /// # Example
    /// ```no_run
    /// use ursa_idmx::cl::{GroupParameters, IssuerKeyPair, SystemParameters};
    ///
    /// let group = GroupParameters::new(&SystemParameters::default()).unwrap();
    /// let _key_pair = IssuerKeyPair::new(&group, 4, None).unwrap();
    /// ```
    pub fn new(group: &GroupParameters, attribute_count: usize, epoch_length: Option<u64>) -> UrsaCryptoResult<IssuerKeyPair> {
        trace!(
            "IssuerKeyPair::new: >>> attribute_count: {:?}, epoch_length: {:?}",
            attribute_count,
            epoch_length
        );

        group.system.validate()?;

        let mut ctx = BigNumber::new_context()?;
        let prime_length = group.system.l_n / 2;

        let p_safe = generate_safe_prime(prime_length)?;
        let mut q_safe = generate_safe_prime(prime_length)?;
        while p_safe == q_safe {
            q_safe = generate_safe_prime(prime_length)?;
        }

        let p_prime = p_safe.rshift1()?;
        let q_prime = q_safe.rshift1()?;
        let n = p_safe.mul(&q_safe, Some(&mut ctx))?;

        let s = random_qr(&n)?;
        let xz = gen_x(&p_prime, &q_prime)?;
        let xr = (0..=attribute_count)
            .map(|_| gen_x(&p_prime, &q_prime))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let z = s.mod_exp(&xz, &n, Some(&mut ctx))?;
        let r = xr
            .iter()
            .map(|x| s.mod_exp(x, &n, None))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let public_key = IssuerPublicKey {
            group: group.clone(),
            n,
            s,
            z,
            r,
            epoch_length,
        };
        let correctness_proof = IssuerKeyPair::_new_key_correctness_proof(&public_key, &xz, &xr)?;

        let key_pair = IssuerKeyPair {
            public_key,
            private_key: IssuerPrivateKey { p_prime, q_prime },
            correctness_proof,
        };

        trace!(
            "IssuerKeyPair::new: <<< public_key: {:?}, private_key: {:?}",
            key_pair.public_key,
            secret!(&key_pair.private_key)
        );

        Ok(key_pair)
    }

    fn _new_key_correctness_proof(
        public_key: &IssuerPublicKey,
        xz: &BigNumber,
        xr: &[BigNumber],
    ) -> UrsaCryptoResult<KeyCorrectnessProof> {
        trace!("IssuerKeyPair::_new_key_correctness_proof: >>>");

        let mut ctx = BigNumber::new_context()?;
        let l_x_tilde = public_key.group.system.l_v_tilde();

        let xz_tilde = bn_rand(l_x_tilde)?;
        let xr_tilde = (0..xr.len())
            .map(|_| bn_rand(l_x_tilde))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let z_tilde = public_key.s.mod_exp(&xz_tilde, &public_key.n, Some(&mut ctx))?;
        let r_tilde = xr_tilde
            .iter()
            .map(|x| public_key.s.mod_exp(x, &public_key.n, None))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let c = _key_correctness_challenge(public_key, &z_tilde, &r_tilde)?;

        let xz_cap = c.mul(xz, Some(&mut ctx))?.add(&xz_tilde)?;
        let xr_cap = xr
            .iter()
            .zip(xr_tilde.iter())
            .map(|(x, x_tilde)| c.mul(x, None)?.add(x_tilde))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let proof = KeyCorrectnessProof { c, xz_cap, xr_cap };

        trace!("IssuerKeyPair::_new_key_correctness_proof: <<< proof: {:?}", proof);

        Ok(proof)
    }
}

fn _key_correctness_challenge(
    public_key: &IssuerPublicKey,
    z_tilde: &BigNumber,
    r_tilde: &[BigNumber],
) -> UrsaCryptoResult<BigNumber> {
    let mut values = vec![public_key.z.to_bytes()?];
    for r in public_key.r.iter() {
        values.push(r.to_bytes()?);
    }
    values.push(z_tilde.to_bytes()?);
    for r in r_tilde.iter() {
        values.push(r.to_bytes()?);
    }
    get_hash_as_int(&values)
}

impl IssuerPublicKey {
    /// Checks the proof that `Z` and `R[i]` were derived from `S`.
    pub fn verify_correctness(&self, proof: &KeyCorrectnessProof) -> UrsaCryptoResult<()> {
        trace!("IssuerPublicKey::verify_correctness: >>> proof: {:?}", proof);

        if proof.xr_cap.len() != self.r.len() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Key correctness proof does not cover every base",
            ));
        }

        let mut ctx = BigNumber::new_context()?;
        let minus_c = proof.c.set_negative(true)?;

        let z_tilde = BigNumber::multi_mod_exp(&[(&self.z, &minus_c), (&self.s, &proof.xz_cap)], &self.n, Some(&mut ctx))?;
        let r_tilde = self
            .r
            .iter()
            .zip(proof.xr_cap.iter())
            .map(|(r, xr_cap)| BigNumber::multi_mod_exp(&[(r, &minus_c), (&self.s, xr_cap)], &self.n, None))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

        let c = _key_correctness_challenge(self, &z_tilde, &r_tilde)?;

        if c != proof.c {
            return Err(err_msg(
                UrsaCryptoErrorKind::ProofRejected,
                "Invalid issuer key correctness proof",
            ));
        }

        trace!("IssuerPublicKey::verify_correctness: <<<");

        Ok(())
    }
}

/// `Q = Z / (U * S^v'' * ∏_known R[i]^m_i) mod n`
pub(crate) fn calc_q(
    public_key: &IssuerPublicKey,
    structure: &CredentialStructure,
    u: &BigNumber,
    v_prime_prime: &BigNumber,
    known_values: &BTreeMap<String, BigNumber>,
) -> UrsaCryptoResult<BigNumber> {
    let one = BigNumber::from_u32(1)?;
    let mut pairs = vec![(u, &one), (&public_key.s, v_prime_prime)];
    pairs.extend(attribute_bases(public_key, structure, known_values, |attr| {
        attr.kind == AttributeKind::Known
    })?);

    let denominator = BigNumber::multi_mod_exp(&pairs, &public_key.n, None)?;

    public_key.z.mod_div(&denominator, &public_key.n, None)
}

/// Signs the blinded attributes `u` together with `known_values`.
///
/// Returns `(A, e, v'')` and the proof binding `A` to `context` and `nonce`.
pub(crate) fn sign_blinded(
    key_pair: &IssuerKeyPair,
    structure: &CredentialStructure,
    u: &BigNumber,
    known_values: &BTreeMap<String, BigNumber>,
    context: &BigNumber,
    nonce: &Nonce,
) -> UrsaCryptoResult<(BigNumber, BigNumber, BigNumber, SignatureCorrectnessProof)> {
    trace!(
        "Issuer::sign_blinded: >>> u: {:?}, known_values: {:?}",
        u,
        secret!(known_values)
    );

    let public_key = &key_pair.public_key;
    let system = &public_key.group.system;
    let mut ctx = BigNumber::new_context()?;

    let e_start = BigNumber::power_of_two(system.l_e - 1)?;
    let e_end = e_start.add(&BigNumber::power_of_two(system.l_e_prime - 1)?)?;
    let e = generate_prime_in_range(&e_start, &e_end)?;
    let v_prime_prime = generate_v_prime_prime(system.l_v)?;

    let q = calc_q(public_key, structure, u, &v_prime_prime, known_values)?;

    let order = key_pair.private_key.order()?;
    let e_inverse = e.inverse(&order, Some(&mut ctx))?;
    let a = q.mod_exp(&e_inverse, &public_key.n, Some(&mut ctx))?;

    let r = bn_rand_range(&order)?;
    let a_cap = q.mod_exp(&r, &public_key.n, Some(&mut ctx))?;

    let c = get_hash_as_int(&[
        q.to_bytes()?,
        a.to_bytes()?,
        a_cap.to_bytes()?,
        context.to_bytes()?,
        nonce.to_bytes()?,
    ])?;
    let se = r.mod_sub(&c.mod_mul(&e_inverse, &order, Some(&mut ctx))?, &order, Some(&mut ctx))?;

    trace!("Issuer::sign_blinded: <<< a: {:?}, e: {:?}", a, e);

    Ok((a, e, v_prime_prime, SignatureCorrectnessProof { c, se }))
}

/// Issuer side of an issuance session.
///
/// # Example
/// ```no_run
/// use ursa_idmx::cl::issuer::Issuer;
/// use ursa_idmx::cl::recipient::Recipient;
/// use ursa_idmx::cl::*;
///
/// let group = GroupParameters::new(&SystemParameters::default()).unwrap();
/// let key_pair = IssuerKeyPair::new(&group, 1, None).unwrap();
///
/// let mut builder = CredentialStructureBuilder::new().unwrap();
/// builder.add_attribute("age", AttributeKind::Hidden, AttributeType::Int).unwrap();
/// let structure = builder.finalize().unwrap();
/// let spec = IssuanceSpec::new(&key_pair.public_key, &structure).unwrap();
///
/// let mut values = ValuesBuilder::new().unwrap();
/// values.add_dec("age", "28").unwrap();
/// let values = values.finalize().unwrap();
///
/// let master_secret = MasterSecret::new(&group).unwrap();
/// let mut issuer = Issuer::new(&key_pair, &spec, ValuesBuilder::new().unwrap().finalize().unwrap()).unwrap();
/// let mut recipient = Recipient::new(&spec, &master_secret, values, &key_pair.correctness_proof).unwrap();
///
/// let msg1 = recipient.round1(issuer.nonce1()).unwrap();
/// let msg2 = issuer.round2(&msg1).unwrap();
/// let _credential = recipient.round3(&msg2).unwrap();
/// ```
#[derive(Debug)]
pub struct Issuer<'a> {
    key_pair: &'a IssuerKeyPair,
    spec: &'a IssuanceSpec,
    values: Values,
    nonce1: Nonce,
    state: IssuanceState,
    update_information: Option<IssuerUpdateInformation>,
}

impl<'a> Issuer<'a> {
    pub fn new(key_pair: &'a IssuerKeyPair, spec: &'a IssuanceSpec, values: Values) -> UrsaCryptoResult<Issuer<'a>> {
        trace!("Issuer::new: >>> spec: {:?}, values: {:?}", spec, secret!(&values));

        if key_pair.public_key != *spec.public_key() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Issuance spec was made for another issuer key",
            ));
        }

        let system = &key_pair.public_key.group.system;
        values.check_against(spec.structure(), ValuesRole::Issuer, system)?;

        let issuer = Issuer {
            key_pair,
            spec,
            values,
            nonce1: new_nonce(system)?,
            state: IssuanceState::Init,
            update_information: None,
        };

        trace!("Issuer::new: <<< nonce1: {:?}", issuer.nonce1);

        Ok(issuer)
    }

    pub fn nonce1(&self) -> &Nonce {
        &self.nonce1
    }

    pub fn state(&self) -> IssuanceState {
        self.state
    }

    /// Update information recorded by round 2 for an updatable structure.
    pub fn update_information(&self) -> Option<&IssuerUpdateInformation> {
        self.update_information.as_ref()
    }

    /// Verifies the recipient's proof and signs the blinded attributes.
    pub fn round2(&mut self, msg1: &IssuanceMessage1) -> UrsaCryptoResult<IssuanceMessage2> {
        trace!("Issuer::round2: >>> msg1: {:?}", msg1);

        check_state(self.state, IssuanceState::Init, "Issuer::round2")?;

        let res = self._round2(msg1);
        self.state = match res {
            Ok(_) => IssuanceState::Round2Sent,
            Err(ref err) => {
                debug!("Issuer::round2: session failed: {}", err);
                IssuanceState::Failed
            }
        };

        trace!("Issuer::round2: <<< res: {:?}", res);

        res
    }

    fn _round2(&mut self, msg1: &IssuanceMessage1) -> UrsaCryptoResult<IssuanceMessage2> {
        self._verify_round1(msg1)?;

        let known_values = self._known_values();
        let (a, e, v_prime_prime, proof) = sign_blinded(
            self.key_pair,
            self.spec.structure(),
            &msg1.u,
            &known_values,
            self.spec.context(),
            &msg1.nonce2,
        )?;

        if self.spec.structure().update_specification().is_some() {
            self.update_information = Some(IssuerUpdateInformation {
                u: msg1.u.clone(),
                known_values,
                structure: self.spec.structure().clone(),
                nonce_counter: 0,
            });
        }

        Ok(IssuanceMessage2 {
            a,
            e,
            v_prime_prime,
            proof,
            nonce2: msg1.nonce2.clone(),
        })
    }

    fn _known_values(&self) -> BTreeMap<String, BigNumber> {
        self.spec
            .structure()
            .attributes()
            .iter()
            .filter(|attr| attr.kind == AttributeKind::Known)
            .filter_map(|attr| {
                self.values
                    .integer(&attr.name)
                    .map(|value| (attr.name.clone(), value.clone()))
            })
            .collect()
    }

    fn _verify_round1(&self, msg1: &IssuanceMessage1) -> UrsaCryptoResult<()> {
        let reject = |msg: &str| Err(err_msg(UrsaCryptoErrorKind::ProofRejected, msg.to_owned()));

        let public_key = self.spec.public_key();
        let structure = self.spec.structure();
        let system = &public_key.group.system;
        let proof = &msg1.proof;

        if msg1.nonce1 != self.nonce1 {
            return reject("Round 1 answers another nonce");
        }

        if msg1.known_values != self._known_values() {
            return reject("Known values differ from the issuer's");
        }

        let mut commitments = Vec::new();
        let mut blinded = Vec::new();
        for (i, attr) in structure.attributes().iter().enumerate() {
            if attr.kind == AttributeKind::Known {
                continue;
            }
            let m_hat = match proof.m_hats.get(&attr.name) {
                Some(m_hat) => m_hat,
                None => return reject("Missing response for a blinded attribute"),
            };
            if !check_bit_length(m_hat, system.l_m_tilde() + 1)? {
                return reject("Attribute response too long");
            }
            blinded.push((public_key.base(i + 1)?, m_hat));

            if attr.kind == AttributeKind::Committed {
                let expected = match self.values.get(&attr.name) {
                    Some(AttributeValue::Commitment(commitment)) => commitment,
                    _ => return reject("Issuer holds no commitment"),
                };
                match (msg1.commitments.get(&attr.name), proof.r_hats.get(&attr.name)) {
                    (Some(commitment), Some(r_hat)) if commitment == expected => {
                        commitments.push((commitment, m_hat, r_hat))
                    }
                    _ => return reject("Commitment differs from the issuer's"),
                }
            }
        }

        if proof.m_hats.len() != blinded.len() || proof.r_hats.len() != commitments.len() {
            return reject("Unexpected responses in round 1");
        }

        if !check_bit_length(&proof.ms_hat, system.l_m_tilde() + 1)?
            || !check_bit_length(&proof.v_prime_hat, system.l_v_prime_tilde() + 1)?
        {
            return reject("Master secret or v' response too long");
        }

        let mut ctx = BigNumber::new_context()?;
        let minus_c = proof.c.set_negative(true)?;

        let mut pairs = vec![
            (&msg1.u, &minus_c),
            (&public_key.s, &proof.v_prime_hat),
            (public_key.base(0)?, &proof.ms_hat),
        ];
        pairs.extend(blinded);
        let u_cap = BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut ctx))?;

        let mut builder = ChallengeBuilder::new();
        builder.add_t_value(&u_cap)?;
        for (commitment, m_hat, r_hat) in commitments.iter() {
            let c_cap = BigNumber::multi_mod_exp(
                &[(*commitment, &minus_c), (&public_key.z, *m_hat), (&public_key.s, *r_hat)],
                &public_key.n,
                Some(&mut ctx),
            )?;
            builder.add_t_value(&c_cap)?;
        }
        builder.add_common_value(&msg1.u)?;
        for (commitment, _, _) in commitments.iter() {
            builder.add_common_value(commitment)?;
        }

        let c = builder.finalize(self.spec.context(), &self.nonce1, &BTreeMap::new())?;
        if c != proof.c {
            return reject("Invalid proof of blinded secrets");
        }

        Ok(())
    }

    /// Re-signs an updatable credential with `new_values` replacing known attribute values.
    ///
    /// Fails with `InvalidStructure` when a value names an attribute outside the update specification.
    pub fn update_credential(
        key_pair: &IssuerKeyPair,
        information: &mut IssuerUpdateInformation,
        new_values: &Values,
    ) -> UrsaCryptoResult<UpdateMessage> {
        trace!(
            "Issuer::update_credential: >>> new_values: {:?}",
            secret!(new_values)
        );

        let public_key = &key_pair.public_key;
        let system = &public_key.group.system;

        let update_specification = information.structure.update_specification().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Credential structure is not updatable",
            )
        })?;
        if !update_specification.verify_values(new_values) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Update names attributes outside the update specification",
            ));
        }

        let mut known_values = information.known_values.clone();
        for (name, value) in new_values.integers()? {
            if value.is_negative() || !check_bit_length(&value, system.l_m)? {
                return Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Value of {} is out of range", name),
                ));
            }
            known_values.insert(name, value);
        }

        let nonce = new_nonce(system)?;
        let (a, e, v_prime_prime, proof) = sign_blinded(
            key_pair,
            &information.structure,
            &information.u,
            &known_values,
            &public_key.context()?,
            &nonce,
        )?;

        information.known_values = known_values;
        information.nonce_counter += 1;

        let msg = UpdateMessage {
            a,
            e,
            v_prime_prime,
            proof,
            nonce,
        };

        trace!("Issuer::update_credential: <<< msg: {:?}", msg);

        Ok(msg)
    }

    /// Moves the structure's epoch attribute to the current epoch of the issuer key.
    pub fn update_epoch(
        key_pair: &IssuerKeyPair,
        information: &mut IssuerUpdateInformation,
    ) -> UrsaCryptoResult<(UpdateMessage, Values)> {
        let name = information
            .structure
            .epoch_attribute()
            .ok_or_else(|| err_msg(UrsaCryptoErrorKind::InvalidStructure, "Structure has no epoch attribute"))?
            .to_owned();

        let epoch = key_pair.public_key.current_epoch()?;
        let mut builder = ValuesBuilder::new()?;
        builder.add_integer(&name, BigNumber::from_u64(epoch)?)?;
        let values = builder.finalize()?;

        let msg = Issuer::update_credential(key_pair, information, &values)?;

        Ok((msg, values))
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use crate::cl::recipient::Recipient;

    #[test]
    fn key_pair_has_one_base_per_attribute_and_master_secret() {
        let key_pair = &*ISSUER_KEY_PAIR;
        assert_eq!(6, key_pair.public_key.r.len());
        assert_eq!(5, key_pair.public_key.attribute_capacity());
        assert_eq!(
            key_pair.public_key.n,
            key_pair
                .private_key
                .p_prime
                .lshift1()
                .unwrap()
                .increment()
                .unwrap()
                .mul(
                    &key_pair.private_key.q_prime.lshift1().unwrap().increment().unwrap(),
                    None
                )
                .unwrap()
        );
    }

    #[test]
    fn key_correctness_proof_verifies() {
        let key_pair = &*ISSUER_KEY_PAIR;
        key_pair
            .public_key
            .verify_correctness(&key_pair.correctness_proof)
            .unwrap();
    }

    #[test]
    fn key_correctness_proof_rejects_tampering() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let mut proof = key_pair.correctness_proof.clone();
        proof.xr_cap[2].add_word(1).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            key_pair.public_key.verify_correctness(&proof).unwrap_err().kind()
        );

        let mut public_key = key_pair.public_key.clone();
        public_key.r[1] = public_key.r[2].clone();
        assert!(public_key.verify_correctness(&key_pair.correctness_proof).is_err());
    }

    #[test]
    fn issuer_rejects_values_of_hidden_attributes() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let values = recipient_values(&key_pair.public_key);
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            Issuer::new(key_pair, &spec, values).unwrap_err().kind()
        );
    }

    #[test]
    fn round2_rejects_foreign_nonce_and_fails_session() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let other_nonce = new_nonce(&GROUP_PARAMETERS.system).unwrap();
        let msg1 = recipient.round1(&other_nonce).unwrap();

        let err = issuer.round2(&msg1).unwrap_err();
        assert_eq!(UrsaCryptoErrorKind::ProofRejected, err.kind());
        assert_eq!(IssuanceState::Failed, issuer.state());

        let err = issuer.round2(&msg1).unwrap_err();
        assert_eq!(UrsaCryptoErrorKind::InvalidState, err.kind());
    }

    #[test]
    fn round2_rejects_tampered_response() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let mut msg1 = recipient.round1(issuer.nonce1()).unwrap();
        msg1.proof.m_hats.get_mut("age").unwrap().add_word(1).unwrap();

        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            issuer.round2(&msg1).unwrap_err().kind()
        );
    }

    #[test]
    fn round2_rejects_other_known_values() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let mut msg1 = recipient.round1(issuer.nonce1()).unwrap();
        msg1.known_values
            .insert("status".to_string(), BigNumber::from_u32(2).unwrap());

        assert!(issuer.round2(&msg1).is_err());
    }

    #[test]
    fn round2_twice_is_invalid_state() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let msg1 = recipient.round1(issuer.nonce1()).unwrap();
        issuer.round2(&msg1).unwrap();
        assert_eq!(IssuanceState::Round2Sent, issuer.state());
        assert!(issuer.update_information().is_some());

        assert_eq!(
            UrsaCryptoErrorKind::InvalidState,
            issuer.round2(&msg1).unwrap_err().kind()
        );
    }

    #[test]
    fn update_rejects_attributes_outside_update_specification() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();
        let msg1 = recipient.round1(issuer.nonce1()).unwrap();
        issuer.round2(&msg1).unwrap();

        let mut information = issuer.update_information().unwrap().clone();

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("name", "42").unwrap();
        let values = builder.finalize().unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            Issuer::update_credential(key_pair, &mut information, &values)
                .unwrap_err()
                .kind()
        );

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("status", "2").unwrap();
        let values = builder.finalize().unwrap();
        Issuer::update_credential(key_pair, &mut information, &values).unwrap();
        assert_eq!(1, information.nonce_counter());
        assert_eq!(
            BigNumber::from_u32(2).unwrap(),
            information.known_values()["status"]
        );
    }

    #[test]
    fn update_epoch_requires_epoch_attribute() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let mut information = IssuerUpdateInformation {
            u: BigNumber::from_u32(4).unwrap(),
            known_values: BTreeMap::new(),
            structure: credential_structure(),
            nonce_counter: 0,
        };
        assert!(Issuer::update_epoch(key_pair, &mut information).is_err());
    }
}
