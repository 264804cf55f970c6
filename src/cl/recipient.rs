use super::hash::{get_hash_as_int, ChallengeBuilder};
use super::helpers::*;
use super::issuer::{calc_q, IssuanceMessage2, SignatureCorrectnessProof, UpdateMessage};
use super::*;
use crate::bn::BigNumber;
use crate::errors::prelude::*;
use crate::utils::commitment::get_pedersen_commitment;

use std::collections::BTreeMap;

/// Proof that `U` and the attribute commitments were formed from the same secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedSecretsCorrectnessProof {
    pub c: BigNumber,
    pub v_prime_hat: BigNumber,
    pub ms_hat: BigNumber,
    pub m_hats: BTreeMap<String, BigNumber>,
    pub r_hats: BTreeMap<String, BigNumber>,
}

/// Recipient's first message: blinded attributes and the proof they are well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceMessage1 {
    pub u: BigNumber,
    pub proof: BlindedSecretsCorrectnessProof,
    pub nonce1: Nonce,
    pub nonce2: Nonce,
    pub known_values: BTreeMap<String, BigNumber>,
    pub commitments: BTreeMap<String, BigNumber>,
}

#[derive(Debug)]
struct Round1Data {
    v_prime: BigNumber,
    u: BigNumber,
    nonce2: Nonce,
}

/// Recipient side of an issuance session.
#[derive(Debug)]
pub struct Recipient<'a> {
    spec: &'a IssuanceSpec,
    master_secret: &'a MasterSecret,
    values: BTreeMap<String, BigNumber>,
    openings: BTreeMap<String, CommitmentOpening>,
    state: IssuanceState,
    round1: Option<Round1Data>,
}

impl<'a> Recipient<'a> {
    /// Checks `values` and the issuer key before any round is run.
    ///
    /// Fails with `ProofRejected` when `key_correctness_proof` does not hold for the issuance key.
    pub fn new(
        spec: &'a IssuanceSpec,
        master_secret: &'a MasterSecret,
        values: Values,
        key_correctness_proof: &KeyCorrectnessProof,
    ) -> UrsaCryptoResult<Recipient<'a>> {
        trace!("Recipient::new: >>> spec: {:?}, values: {:?}", spec, secret!(&values));

        let public_key = spec.public_key();
        values.check_against(spec.structure(), ValuesRole::Recipient, &public_key.group.system)?;
        public_key.verify_correctness(key_correctness_proof)?;
        master_secret.check_group(&public_key.group)?;

        let mut plain = BTreeMap::new();
        let mut openings = BTreeMap::new();
        for name in values.names() {
            match values.get(name) {
                Some(AttributeValue::Integer(value)) => {
                    plain.insert(name.clone(), value.clone());
                }
                Some(AttributeValue::Opening(opening)) => {
                    plain.insert(name.clone(), opening.messages()[0].clone());
                    openings.insert(name.clone(), opening.clone());
                }
                _ => {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Recipient cannot hold a bare commitment for {}", name),
                    ))
                }
            }
        }

        trace!("Recipient::new: <<<");

        Ok(Recipient {
            spec,
            master_secret,
            values: plain,
            openings,
            state: IssuanceState::Init,
            round1: None,
        })
    }

    pub fn state(&self) -> IssuanceState {
        self.state
    }

    /// Blinds hidden and committed attributes under `U` and proves it is well formed for `nonce1`.
    pub fn round1(&mut self, nonce1: &Nonce) -> UrsaCryptoResult<IssuanceMessage1> {
        trace!("Recipient::round1: >>> nonce1: {:?}", nonce1);

        check_state(self.state, IssuanceState::Init, "Recipient::round1")?;

        let res = self._round1(nonce1);
        self.state = match res {
            Ok(_) => IssuanceState::Round1Sent,
            Err(_) => IssuanceState::Failed,
        };

        trace!("Recipient::round1: <<< res: {:?}", res);

        res
    }

    fn _round1(&mut self, nonce1: &Nonce) -> UrsaCryptoResult<IssuanceMessage1> {
        let public_key = self.spec.public_key();
        let structure = self.spec.structure();
        let system = &public_key.group.system;
        let mut ctx = BigNumber::new_context()?;

        let commitment_key = public_key.commitment_key(1)?;
        let mut committed = Vec::new();
        for attr in structure.attributes() {
            if attr.kind != AttributeKind::Committed {
                continue;
            }
            let opening = self.openings.get(&attr.name).ok_or_else(|| {
                err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Missing opening for {}", attr.name),
                )
            })?;
            if *opening.key() != commitment_key || !opening.verify()? {
                return Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Opening of {} does not verify", attr.name),
                ));
            }
            committed.push((attr.name.clone(), opening));
        }

        let v_prime = bn_rand(system.l_v_prime())?;

        let mut pairs = vec![(&public_key.s, &v_prime), (public_key.base(0)?, self.master_secret.value())];
        pairs.extend(attribute_bases(public_key, structure, &self.values, |attr| {
            attr.kind != AttributeKind::Known
        })?);
        let u = BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut ctx))?;

        let v_prime_tilde = bn_rand(system.l_v_prime_tilde())?;
        let ms_tilde = bn_rand(system.l_m_tilde())?;

        let mut m_tildes = BTreeMap::new();
        let mut r_tildes = BTreeMap::new();
        for attr in structure.attributes() {
            if attr.kind != AttributeKind::Known {
                m_tildes.insert(attr.name.clone(), bn_rand(system.l_m_tilde())?);
            }
            if attr.kind == AttributeKind::Committed {
                r_tildes.insert(attr.name.clone(), bn_rand(system.l_r_tilde())?);
            }
        }

        let mut pairs = vec![(&public_key.s, &v_prime_tilde), (public_key.base(0)?, &ms_tilde)];
        pairs.extend(attribute_bases(public_key, structure, &m_tildes, |attr| {
            attr.kind != AttributeKind::Known
        })?);
        let u_tilde = BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut ctx))?;

        let mut builder = ChallengeBuilder::new();
        builder.add_t_value(&u_tilde)?;
        for (name, _) in committed.iter() {
            let c_tilde = get_pedersen_commitment(
                &public_key.z,
                &m_tildes[name],
                &public_key.s,
                &r_tildes[name],
                &public_key.n,
                &mut ctx,
            )?;
            builder.add_t_value(&c_tilde)?;
        }
        builder.add_common_value(&u)?;
        for (_, opening) in committed.iter() {
            builder.add_common_value(opening.commitment())?;
        }
        let c = builder.finalize(self.spec.context(), nonce1, &BTreeMap::new())?;

        let respond = |tilde: &BigNumber, secret: &BigNumber| -> UrsaCryptoResult<BigNumber> {
            c.mul(secret, None)?.add(tilde)
        };

        let mut m_hats = BTreeMap::new();
        for (name, m_tilde) in m_tildes.iter() {
            m_hats.insert(name.clone(), respond(m_tilde, &self.values[name])?);
        }
        let mut r_hats = BTreeMap::new();
        for (name, opening) in committed.iter() {
            r_hats.insert(name.clone(), respond(&r_tildes[name], opening.randomness())?);
        }

        let proof = BlindedSecretsCorrectnessProof {
            v_prime_hat: respond(&v_prime_tilde, &v_prime)?,
            ms_hat: respond(&ms_tilde, self.master_secret.value())?,
            c,
            m_hats,
            r_hats,
        };

        let known_values = structure
            .attributes()
            .iter()
            .filter(|attr| attr.kind == AttributeKind::Known)
            .map(|attr| (attr.name.clone(), self.values[&attr.name].clone()))
            .collect();
        let commitments = committed
            .iter()
            .map(|(name, opening)| (name.clone(), opening.commitment().clone()))
            .collect();

        let nonce2 = new_nonce(system)?;

        self.round1 = Some(Round1Data {
            v_prime,
            u: u.clone(),
            nonce2: nonce2.clone(),
        });

        Ok(IssuanceMessage1 {
            u,
            proof,
            nonce1: nonce1.clone(),
            nonce2,
            known_values,
            commitments,
        })
    }

    /// Checks the issuer's signature and assembles the credential.
    pub fn round3(&mut self, msg2: &IssuanceMessage2) -> UrsaCryptoResult<Credential> {
        trace!("Recipient::round3: >>> msg2: {:?}", msg2);

        check_state(self.state, IssuanceState::Round1Sent, "Recipient::round3")?;

        let res = self._round3(msg2);
        self.state = match res {
            Ok(_) => IssuanceState::Done,
            Err(ref err) => {
                debug!("Recipient::round3: session failed: {}", err);
                IssuanceState::Failed
            }
        };

        trace!("Recipient::round3: <<< res: {:?}", res);

        res
    }

    fn _round3(&mut self, msg2: &IssuanceMessage2) -> UrsaCryptoResult<Credential> {
        let round1 = self
            .round1
            .take()
            .ok_or_else(|| err_msg(UrsaCryptoErrorKind::InvalidState, "Round 1 was not run"))?;

        if msg2.nonce2 != round1.nonce2 {
            return Err(err_msg(
                UrsaCryptoErrorKind::ProofRejected,
                "Round 2 answers another nonce",
            ));
        }

        let public_key = self.spec.public_key();
        let structure = self.spec.structure();

        verify_signature_correctness(
            public_key,
            structure,
            &round1.u,
            &self.values,
            &msg2.a,
            &msg2.e,
            &msg2.v_prime_prime,
            &msg2.proof,
            self.spec.context(),
            &round1.nonce2,
        )?;

        let update_state = match structure.update_specification() {
            Some(_) => Some(CredentialUpdateState {
                v_prime: round1.v_prime.clone(),
                u: round1.u.clone(),
            }),
            None => None,
        };

        let credential = Credential {
            signature: CredentialSignature {
                a: msg2.a.clone(),
                e: msg2.e.clone(),
                v: round1.v_prime.add(&msg2.v_prime_prime)?,
            },
            values: self.values.clone(),
            structure: structure.clone(),
            public_key: public_key.clone(),
            update_state,
        };

        if !credential.verify_signature(self.master_secret)? {
            return Err(err_msg(
                UrsaCryptoErrorKind::ProofRejected,
                "Issued signature does not verify",
            ));
        }

        Ok(credential)
    }
}

/// Checks `e` and the proof that `A = Q^(1/e)` for `Q` recomputed from `u` and the known values.
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_signature_correctness(
    public_key: &IssuerPublicKey,
    structure: &CredentialStructure,
    u: &BigNumber,
    values: &BTreeMap<String, BigNumber>,
    a: &BigNumber,
    e: &BigNumber,
    v_prime_prime: &BigNumber,
    proof: &SignatureCorrectnessProof,
    context: &BigNumber,
    nonce: &Nonce,
) -> UrsaCryptoResult<()> {
    trace!(
        "Recipient::verify_signature_correctness: >>> a: {:?}, e: {:?}, proof: {:?}",
        a,
        e,
        proof
    );

    let system = &public_key.group.system;

    let e_start = BigNumber::power_of_two(system.l_e - 1)?;
    let e_end = e_start.add(&BigNumber::power_of_two(system.l_e_prime - 1)?)?;
    if !e.is_prime(None)? || *e < e_start || *e > e_end {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            "Signature exponent is not a prime of the expected range",
        ));
    }

    let known_values = structure
        .attributes()
        .iter()
        .filter(|attr| attr.kind == AttributeKind::Known)
        .map(|attr| {
            values
                .get(&attr.name)
                .map(|value| (attr.name.clone(), value.clone()))
                .ok_or_else(|| {
                    err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Missing value for attribute {}", attr.name),
                    )
                })
        })
        .collect::<UrsaCryptoResult<BTreeMap<String, BigNumber>>>()?;

    let q = calc_q(public_key, structure, u, v_prime_prime, &known_values)?;

    let exp = proof.c.add(&proof.se.mul(e, None)?)?;
    let a_cap = a.mod_exp(&exp, &public_key.n, None)?;

    let c = get_hash_as_int(&[
        q.to_bytes()?,
        a.to_bytes()?,
        a_cap.to_bytes()?,
        context.to_bytes()?,
        nonce.to_bytes()?,
    ])?;

    if c != proof.c {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            "Invalid signature correctness proof",
        ));
    }

    trace!("Recipient::verify_signature_correctness: <<<");

    Ok(())
}

impl Credential {
    /// Accepts an issuer update for `new_values`.
    ///
    /// Nothing changes unless the new signature verifies on the merged values.
    pub fn update(
        &mut self,
        master_secret: &MasterSecret,
        msg: &UpdateMessage,
        new_values: &Values,
    ) -> UrsaCryptoResult<()> {
        trace!(
            "Credential::update: >>> msg: {:?}, new_values: {:?}",
            msg,
            secret!(new_values)
        );

        let state = self.update_state.as_ref().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidState,
                "Credential was not issued as updatable",
            )
        })?;

        let update_specification = self.structure.update_specification().ok_or_else(|| {
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

        let mut values = self.values.clone();
        values.extend(new_values.integers()?);

        verify_signature_correctness(
            &self.public_key,
            &self.structure,
            &state.u,
            &values,
            &msg.a,
            &msg.e,
            &msg.v_prime_prime,
            &msg.proof,
            &self.public_key.context()?,
            &msg.nonce,
        )?;

        let signature = CredentialSignature {
            a: msg.a.clone(),
            e: msg.e.clone(),
            v: state.v_prime.add(&msg.v_prime_prime)?,
        };

        if !check_cl_signature(&self.public_key, &self.structure, &signature, &values, master_secret)? {
            return Err(err_msg(
                UrsaCryptoErrorKind::ProofRejected,
                "Updated signature does not verify",
            ));
        }

        self.signature = signature;
        self.values = values;

        trace!("Credential::update: <<<");

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use crate::cl::issuer::mocks::*;
    use crate::cl::issuer::Issuer;

    #[test]
    fn issuance_round_trip_produces_valid_credential() {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (credential, update_information) = issue_credential(&master_secret);

        assert!(credential.verify_signature(&master_secret).unwrap());
        assert_eq!(BigNumber::from_u32(28).unwrap(), credential.values()["age"]);
        assert_eq!(BigNumber::from_u32(5).unwrap(), credential.values()["level"]);
        assert!(credential.update_state().is_some());
        assert!(update_information.is_some());

        let other = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        assert!(!credential.verify_signature(&other).unwrap());
    }

    #[test]
    fn rounds_out_of_order_are_invalid_state() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let msg1 = recipient.round1(issuer.nonce1()).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidState,
            recipient.round1(issuer.nonce1()).unwrap_err().kind()
        );

        let msg2 = issuer.round2(&msg1).unwrap();
        recipient.round3(&msg2).unwrap();
        assert_eq!(IssuanceState::Done, recipient.state());
        assert_eq!(
            UrsaCryptoErrorKind::InvalidState,
            recipient.round3(&msg2).unwrap_err().kind()
        );
    }

    #[test]
    fn round3_rejects_tampered_signature() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let recipient_values = recipient_values(&key_pair.public_key);
        let issuer_values = issuer_values(&recipient_values);

        let mut issuer = Issuer::new(key_pair, &spec, issuer_values).unwrap();
        let mut recipient = Recipient::new(&spec, &master_secret, recipient_values, &key_pair.correctness_proof).unwrap();

        let msg1 = recipient.round1(issuer.nonce1()).unwrap();
        let mut msg2 = issuer.round2(&msg1).unwrap();
        msg2.v_prime_prime.add_word(2).unwrap();

        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            recipient.round3(&msg2).unwrap_err().kind()
        );
        assert_eq!(IssuanceState::Failed, recipient.state());
    }

    #[test]
    fn recipient_rejects_foreign_key_proof_and_group() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let mut proof = key_pair.correctness_proof.clone();
        proof.xz_cap.add_word(1).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            Recipient::new(&spec, &master_secret, recipient_values(&key_pair.public_key), &proof)
                .unwrap_err()
                .kind()
        );

        let mut foreign = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        foreign.group_context = BigNumber::from_u32(1).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            Recipient::new(
                &spec,
                &foreign,
                recipient_values(&key_pair.public_key),
                &key_pair.correctness_proof
            )
            .unwrap_err()
            .kind()
        );
    }

    #[test]
    fn round1_rejects_opening_under_other_key() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let spec = IssuanceSpec::new(&key_pair.public_key, &credential_structure()).unwrap();
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let opening = key_pair
            .public_key
            .commitment_key(2)
            .unwrap()
            .commit(&[BigNumber::from_u32(5).unwrap(), BigNumber::from_u32(6).unwrap()])
            .unwrap();
        let mut recipient = Recipient::new(
            &spec,
            &master_secret,
            recipient_values(&key_pair.public_key),
            &key_pair.correctness_proof,
        )
        .unwrap();
        recipient.openings.insert("level".to_string(), opening);

        let nonce = new_nonce(&GROUP_PARAMETERS.system).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            recipient.round1(&nonce).unwrap_err().kind()
        );
        assert_eq!(IssuanceState::Failed, recipient.state());
    }

    #[test]
    fn credential_update_works() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (mut credential, update_information) = issue_credential(&master_secret);
        let mut information = update_information.unwrap();

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("status", "7").unwrap();
        let new_values = builder.finalize().unwrap();

        let msg = Issuer::update_credential(key_pair, &mut information, &new_values).unwrap();
        credential.update(&master_secret, &msg, &new_values).unwrap();

        assert_eq!(BigNumber::from_u32(7).unwrap(), credential.values()["status"]);
        assert!(credential.verify_signature(&master_secret).unwrap());
    }

    #[test]
    fn failed_update_leaves_credential_unchanged() {
        let key_pair = &*ISSUER_KEY_PAIR;
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (mut credential, update_information) = issue_credential(&master_secret);
        let mut information = update_information.unwrap();
        let before = credential.clone();

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("status", "7").unwrap();
        let new_values = builder.finalize().unwrap();
        let msg = Issuer::update_credential(key_pair, &mut information, &new_values).unwrap();

        // values other than the ones signed
        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("status", "8").unwrap();
        let wrong_values = builder.finalize().unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            credential.update(&master_secret, &msg, &wrong_values).unwrap_err().kind()
        );
        assert_eq!(before, credential);

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("name", "8").unwrap();
        let not_updatable = builder.finalize().unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            credential.update(&master_secret, &msg, &not_updatable).unwrap_err().kind()
        );
        assert_eq!(before, credential);
    }
}
