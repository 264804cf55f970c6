use super::encryption::VerifiableEncryption;
use super::hash::ChallengeBuilder;
use super::helpers::check_bit_length;
use super::predicates::{
    cl as cl_predicate, commitment as commitment_predicate, inequality as inequality_predicate,
    pseudonym as pseudonym_predicate, representation as representation_predicate,
    verifiable_encryption as verifiable_encryption_predicate, Commitments, VerifierContext,
};
use super::proof::{Predicate, Proof, ProofSpec, SubProof};
use super::{new_nonce, Nonce, SystemParameters};
use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::collections::{BTreeMap, BTreeSet};

/// Checks proofs against one `ProofSpec` and exposes what a successful proof discloses.
#[derive(Debug)]
pub struct Verifier<'a> {
    spec: &'a ProofSpec,
    revealed_values: BTreeMap<String, BigNumber>,
    commitments: BTreeMap<String, BigNumber>,
    verifiable_encryptions: BTreeMap<String, VerifiableEncryption>,
    pseudonyms: BTreeMap<String, BigNumber>,
    domain_pseudonyms: BTreeMap<String, BigNumber>,
}

impl<'a> Verifier<'a> {
    /// Fresh nonce the prover must bind its proof to.
    pub fn new_nonce(system: &SystemParameters) -> UrsaCryptoResult<Nonce> {
        new_nonce(system)
    }

    pub fn new(spec: &'a ProofSpec) -> Verifier<'a> {
        Verifier {
            spec,
            revealed_values: BTreeMap::new(),
            commitments: BTreeMap::new(),
            verifiable_encryptions: BTreeMap::new(),
            pseudonyms: BTreeMap::new(),
            domain_pseudonyms: BTreeMap::new(),
        }
    }

    /// Revealed identifier values of the last accepted proof.
    pub fn revealed_values(&self) -> &BTreeMap<String, BigNumber> {
        &self.revealed_values
    }

    /// Commitment values by predicate name.
    pub fn commitments(&self) -> &BTreeMap<String, BigNumber> {
        &self.commitments
    }

    pub fn verifiable_encryptions(&self) -> &BTreeMap<String, VerifiableEncryption> {
        &self.verifiable_encryptions
    }

    /// Pseudonyms by predicate name.
    pub fn pseudonyms(&self) -> &BTreeMap<String, BigNumber> {
        &self.pseudonyms
    }

    /// Domain pseudonyms by scope.
    pub fn domain_pseudonyms(&self) -> &BTreeMap<String, BigNumber> {
        &self.domain_pseudonyms
    }

    /// `Ok(false)` when the proof is well-formed for the proof spec but does not verify,
    /// `InvalidStructure` when its shape does not fit the proof spec.
    pub fn verify(&mut self, proof: &Proof, nonce: &Nonce) -> UrsaCryptoResult<bool> {
        trace!("Verifier::verify: >>> proof: {:?}, nonce: {:?}", proof, nonce);

        self._clear();
        self._check_shape(proof)?;

        let spec = self.spec;
        let group = spec.group();
        let system = &group.system;

        for m_hat in proof.m_hats.values().chain(proof.ms_hat.iter()) {
            if !check_bit_length(m_hat, system.l_m_tilde() + 1)? {
                debug!("Verifier::verify: response exceeds {} bits", system.l_m_tilde() + 1);
                return Ok(false);
            }
        }

        let ctx = VerifierContext {
            group,
            challenge: &proof.c,
            minus_c: proof.c.set_negative(true)?,
            ms_hat: proof.ms_hat.as_ref(),
            m_hats: &proof.m_hats,
            revealed_values: &proof.revealed_values,
        };

        let mut challenge_builder = ChallengeBuilder::new();
        for (predicate, sub_proof) in spec.predicates().iter().zip(proof.sub_proofs.iter()) {
            let commitments = match _verify_predicate(predicate, sub_proof, &ctx) {
                Ok(commitments) => commitments,
                Err(ref err) if err.kind() == UrsaCryptoErrorKind::ProofRejected => {
                    debug!("Verifier::verify: {}", err);
                    return Ok(false);
                }
                Err(err) => return Err(err),
            };
            challenge_builder.add_t_values(&commitments.t_values)?;
            challenge_builder.add_common_values(&commitments.common_values)?;
        }

        let c_hat = challenge_builder.finalize(&spec.context()?, nonce, spec.messages())?;
        if c_hat != proof.c {
            debug!("Verifier::verify: challenge mismatch");
            return Ok(false);
        }

        self.revealed_values = proof.revealed_values.clone();
        for (predicate, sub_proof) in spec.predicates().iter().zip(proof.sub_proofs.iter()) {
            match (predicate, sub_proof) {
                (Predicate::Commitment(p), SubProof::Commitment(sp)) => {
                    self.commitments.insert(p.name.clone(), sp.commitment.clone());
                }
                (Predicate::VerifiableEncryption(p), SubProof::VerifiableEncryption(sp)) => {
                    self.verifiable_encryptions.insert(p.name.clone(), sp.ciphertext.clone());
                }
                (Predicate::Pseudonym(p), SubProof::Pseudonym(sp)) => {
                    self.pseudonyms.insert(p.name.clone(), sp.nym.clone());
                }
                (Predicate::DomainPseudonym(p), SubProof::DomainPseudonym(sp)) => {
                    self.domain_pseudonyms.insert(p.scope.clone(), sp.d_nym.clone());
                }
                _ => {}
            }
        }

        trace!("Verifier::verify: <<< revealed_values: {:?}", self.revealed_values);

        Ok(true)
    }

    fn _clear(&mut self) {
        self.revealed_values.clear();
        self.commitments.clear();
        self.verifiable_encryptions.clear();
        self.pseudonyms.clear();
        self.domain_pseudonyms.clear();
    }

    fn _check_shape(&self, proof: &Proof) -> UrsaCryptoResult<()> {
        let spec = self.spec;

        if proof.sub_proofs.len() != spec.predicates().len() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!(
                    "{} sub-proofs for {} predicates",
                    proof.sub_proofs.len(),
                    spec.predicates().len()
                ),
            ));
        }

        let hidden: BTreeSet<&String> = spec
            .identifiers()
            .iter()
            .filter(|i| !i.revealed)
            .map(|i| &i.name)
            .collect();
        let revealed: BTreeSet<&String> = spec
            .identifiers()
            .iter()
            .filter(|i| i.revealed)
            .map(|i| &i.name)
            .collect();

        if proof.m_hats.keys().collect::<BTreeSet<&String>>() != hidden
            || proof.revealed_values.keys().collect::<BTreeSet<&String>>() != revealed
        {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Proof identifiers do not match the proof spec",
            ));
        }

        if proof.ms_hat.is_some() != spec.uses_master_secret() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Master secret response does not match the proof spec",
            ));
        }

        Ok(())
    }
}

fn _verify_predicate(predicate: &Predicate, sub_proof: &SubProof, ctx: &VerifierContext) -> UrsaCryptoResult<Commitments> {
    match (predicate, sub_proof) {
        (Predicate::Cl(p), SubProof::Cl(sp)) => cl_predicate::verify(p, sp, ctx),
        (Predicate::Inequality(p), SubProof::Inequality(sp)) => inequality_predicate::verify(p, sp, ctx),
        (Predicate::Commitment(p), SubProof::Commitment(sp)) => commitment_predicate::verify(p, sp, ctx),
        (Predicate::Representation(p), SubProof::Representation(_)) => representation_predicate::verify(p, ctx),
        (Predicate::VerifiableEncryption(p), SubProof::VerifiableEncryption(sp)) => {
            verifiable_encryption_predicate::verify(p, sp, ctx)
        }
        (Predicate::Pseudonym(p), SubProof::Pseudonym(sp)) => pseudonym_predicate::verify(p, sp, ctx),
        (Predicate::DomainPseudonym(p), SubProof::DomainPseudonym(sp)) => pseudonym_predicate::verify_domain(p, sp, ctx),
        _ => Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            "Sub-proof does not match its predicate",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cl::issuer::mocks::*;
    use crate::cl::proof::mocks::age_spec;
    use crate::cl::prover::Prover;
    use crate::cl::recipient::mocks::issue_credential;
    use crate::cl::MasterSecret;

    fn proof_for(spec: &ProofSpec, nonce: &Nonce) -> Proof {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (credential, _) = issue_credential(&master_secret);
        let mut prover = Prover::new(&master_secret, spec).unwrap();
        prover.add_credential("id", &credential).unwrap();
        prover.build_proof(nonce).unwrap()
    }

    #[test]
    fn verify_works_and_exposes_revealed_values() {
        let spec = age_spec(18);
        let nonce = Verifier::new_nonce(&GROUP_PARAMETERS.system).unwrap();
        let proof = proof_for(&spec, &nonce);

        let mut verifier = Verifier::new(&spec);
        assert!(verifier.verify(&proof, &nonce).unwrap());
        assert_eq!(proof.revealed_values, *verifier.revealed_values());
        assert!(verifier.verify(&proof, &nonce).unwrap());
        assert_eq!(proof.revealed_values, *verifier.revealed_values());
    }

    #[test]
    fn verify_rejects_other_nonce_and_clears_values() {
        let spec = age_spec(18);
        let nonce = Verifier::new_nonce(&GROUP_PARAMETERS.system).unwrap();
        let proof = proof_for(&spec, &nonce);

        let mut verifier = Verifier::new(&spec);
        assert!(verifier.verify(&proof, &nonce).unwrap());

        let other = Verifier::new_nonce(&GROUP_PARAMETERS.system).unwrap();
        assert!(!verifier.verify(&proof, &other).unwrap());
        assert!(verifier.revealed_values().is_empty());
    }

    #[test]
    fn verify_rejects_tampered_response() {
        let spec = age_spec(18);
        let nonce = Verifier::new_nonce(&GROUP_PARAMETERS.system).unwrap();
        let mut proof = proof_for(&spec, &nonce);

        let m_hat = proof.m_hats["age"].increment().unwrap();
        proof.m_hats.insert("age".to_string(), m_hat);

        let mut verifier = Verifier::new(&spec);
        assert!(!verifier.verify(&proof, &nonce).unwrap());
    }

    #[test]
    fn verify_rejects_malformed_proof() {
        let spec = age_spec(18);
        let nonce = Verifier::new_nonce(&GROUP_PARAMETERS.system).unwrap();
        let proof = proof_for(&spec, &nonce);
        let mut verifier = Verifier::new(&spec);

        let mut missing = proof.clone();
        missing.sub_proofs.pop();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            verifier.verify(&missing, &nonce).unwrap_err().kind()
        );

        let mut swapped = proof.clone();
        swapped.sub_proofs.swap(0, 1);
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            verifier.verify(&swapped, &nonce).unwrap_err().kind()
        );

        let mut no_ms_hat = proof;
        no_ms_hat.ms_hat = None;
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            verifier.verify(&no_ms_hat, &nonce).unwrap_err().kind()
        );
    }
}
