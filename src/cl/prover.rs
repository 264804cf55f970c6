use super::hash::ChallengeBuilder;
use super::helpers::bn_rand;
use super::predicates::cl::{self as cl_predicate, ClProverState};
use super::predicates::commitment::{self as commitment_predicate, CommitmentProverState};
use super::predicates::inequality::{self as inequality_predicate, InequalityProverState};
use super::predicates::pseudonym::{self as pseudonym_predicate, PseudonymProverState};
use super::predicates::representation as representation_predicate;
use super::predicates::verifiable_encryption::{self as verifiable_encryption_predicate, VerifiableEncryptionProverState};
use super::predicates::{response, Commitments, IdentifierSecret, ProverContext};
use super::proof::*;
use super::{CommitmentOpening, Credential, MasterSecret, Nonce, RepresentationOpening};
use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::collections::BTreeMap;

/// Prover-side secrets of one predicate between commitment and response.
enum PredicateState {
    Cl(ClProverState),
    Inequality(InequalityProverState),
    Commitment(CommitmentProverState),
    Representation,
    VerifiableEncryption(VerifiableEncryptionProverState),
    Pseudonym(PseudonymProverState),
    DomainPseudonym(DomainPseudonymProof),
}

/// Builds a proof for a `ProofSpec` from the holder's master secret, credentials and openings.
///
/// # Example
/// ```no_run
/// use ursa_idmx::cl::prover::Prover;
/// use ursa_idmx::cl::verifier::Verifier;
/// # use ursa_idmx::cl::{Credential, MasterSecret};
/// # use ursa_idmx::cl::proof::ProofSpec;
/// # fn show(master_secret: &MasterSecret, credential: &Credential, spec: &ProofSpec) {
/// let nonce = Verifier::new_nonce(&spec.group().system).unwrap();
///
/// let mut prover = Prover::new(master_secret, spec).unwrap();
/// prover.add_credential("id", credential).unwrap();
/// let proof = prover.build_proof(&nonce).unwrap();
///
/// let mut verifier = Verifier::new(spec);
/// assert!(verifier.verify(&proof, &nonce).unwrap());
/// # }
/// ```
#[derive(Debug)]
pub struct Prover<'a> {
    master_secret: &'a MasterSecret,
    spec: &'a ProofSpec,
    credentials: BTreeMap<String, &'a Credential>,
    commitment_openings: BTreeMap<String, &'a CommitmentOpening>,
    representation_openings: BTreeMap<String, &'a RepresentationOpening>,
    pseudonym_openings: BTreeMap<String, &'a PseudonymOpening>,
}

fn _insert_unique<'a, T>(map: &mut BTreeMap<String, &'a T>, kind: &str, name: &str, value: &'a T) -> UrsaCryptoResult<()> {
    if map.contains_key(name) {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("{} {} already added", kind, name),
        ));
    }
    map.insert(name.to_owned(), value);
    Ok(())
}

impl<'a> Prover<'a> {
    pub fn new(master_secret: &'a MasterSecret, spec: &'a ProofSpec) -> UrsaCryptoResult<Prover<'a>> {
        master_secret.check_group(spec.group())?;

        Ok(Prover {
            master_secret,
            spec,
            credentials: BTreeMap::new(),
            commitment_openings: BTreeMap::new(),
            representation_openings: BTreeMap::new(),
            pseudonym_openings: BTreeMap::new(),
        })
    }

    /// One-shot proof over a set of named credentials.
    pub fn build(
        master_secret: &MasterSecret,
        credentials: &BTreeMap<String, Credential>,
        spec: &ProofSpec,
        nonce: &Nonce,
    ) -> UrsaCryptoResult<Proof> {
        let mut prover = Prover::new(master_secret, spec)?;
        for (name, credential) in credentials.iter() {
            prover.add_credential(name, credential)?;
        }
        prover.build_proof(nonce)
    }

    pub fn add_credential(&mut self, name: &str, credential: &'a Credential) -> UrsaCryptoResult<()> {
        _insert_unique(&mut self.credentials, "Credential", name, credential)
    }

    pub fn add_commitment_opening(&mut self, name: &str, opening: &'a CommitmentOpening) -> UrsaCryptoResult<()> {
        _insert_unique(&mut self.commitment_openings, "Commitment", name, opening)
    }

    pub fn add_representation_opening(
        &mut self,
        name: &str,
        opening: &'a RepresentationOpening,
    ) -> UrsaCryptoResult<()> {
        _insert_unique(&mut self.representation_openings, "Representation", name, opening)
    }

    /// Re-uses an existing pseudonym. Pseudonym predicates without an opening get a fresh one.
    pub fn add_pseudonym_opening(&mut self, name: &str, opening: &'a PseudonymOpening) -> UrsaCryptoResult<()> {
        _insert_unique(&mut self.pseudonym_openings, "Pseudonym", name, opening)
    }

    pub fn build_proof(&self, nonce: &Nonce) -> UrsaCryptoResult<Proof> {
        trace!("Prover::build_proof: >>> nonce: {:?}", nonce);

        let spec = self.spec;
        let group = spec.group();
        let system = &group.system;

        let values = self._identifier_values()?;
        self._check_statements(&values)?;

        let mut identifiers = BTreeMap::new();
        for identifier in spec.identifiers() {
            let value = values.get(&identifier.name).ok_or_else(|| {
                err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("No value for identifier {}", identifier.name),
                )
            })?;
            let tilde = if identifier.revealed {
                None
            } else {
                Some(bn_rand(system.l_m_tilde())?)
            };
            identifiers.insert(
                identifier.name.clone(),
                IdentifierSecret {
                    value: value.clone(),
                    tilde,
                },
            );
        }

        let mut fresh_pseudonyms = BTreeMap::new();
        for predicate in spec.predicates() {
            if let Predicate::Pseudonym(p) = predicate {
                if !self.pseudonym_openings.contains_key(&p.name) {
                    fresh_pseudonyms.insert(p.name.clone(), PseudonymOpening::new(self.master_secret, group)?);
                }
            }
        }

        let ctx = ProverContext {
            group,
            master_secret: self.master_secret,
            ms_tilde: bn_rand(system.l_m_tilde())?,
            identifiers,
        };

        let mut challenge_builder = ChallengeBuilder::new();
        let mut states = Vec::with_capacity(spec.predicates().len());

        for predicate in spec.predicates() {
            let (commitments, state): (Commitments, PredicateState) = match predicate {
                Predicate::Cl(p) => {
                    let credential = self.credentials.get(&p.credential).ok_or_else(|| {
                        err_msg(
                            UrsaCryptoErrorKind::InvalidStructure,
                            format!("Credential {} not added", p.credential),
                        )
                    })?;
                    let (commitments, state) = cl_predicate::init(p, credential, &ctx)?;
                    (commitments, PredicateState::Cl(state))
                }
                Predicate::Inequality(p) => {
                    let (commitments, state) = inequality_predicate::init(p, &ctx)?;
                    (commitments, PredicateState::Inequality(state))
                }
                Predicate::Commitment(p) => {
                    let opening = self._commitment_opening(&p.name)?;
                    let (commitments, state) = commitment_predicate::init(p, opening, &ctx)?;
                    (commitments, PredicateState::Commitment(state))
                }
                Predicate::Representation(p) => {
                    let opening = self._representation_opening(&p.name)?;
                    let commitments = representation_predicate::init(p, opening, &ctx)?;
                    (commitments, PredicateState::Representation)
                }
                Predicate::VerifiableEncryption(p) => {
                    let (commitments, state) = verifiable_encryption_predicate::init(p, &ctx)?;
                    (commitments, PredicateState::VerifiableEncryption(state))
                }
                Predicate::Pseudonym(p) => {
                    let opening = match self.pseudonym_openings.get(&p.name) {
                        Some(opening) => *opening,
                        None => fresh_pseudonyms.get(&p.name).ok_or_else(|| {
                            err_msg(UrsaCryptoErrorKind::InvalidState, "Pseudonym opening missing")
                        })?,
                    };
                    let (commitments, state) = pseudonym_predicate::init(p, opening, &ctx)?;
                    (commitments, PredicateState::Pseudonym(state))
                }
                Predicate::DomainPseudonym(p) => {
                    let (commitments, proof) = pseudonym_predicate::init_domain(p, &ctx)?;
                    (commitments, PredicateState::DomainPseudonym(proof))
                }
            };

            challenge_builder.add_t_values(&commitments.t_values)?;
            challenge_builder.add_common_values(&commitments.common_values)?;
            states.push(state);
        }

        let c = challenge_builder.finalize(&spec.context()?, nonce, spec.messages())?;

        let mut m_hats = BTreeMap::new();
        let mut revealed_values = BTreeMap::new();
        for (name, secret) in ctx.identifiers.iter() {
            match secret.tilde {
                Some(ref tilde) => {
                    m_hats.insert(name.clone(), response(tilde, &c, &secret.value)?);
                }
                None => {
                    revealed_values.insert(name.clone(), secret.value.clone());
                }
            }
        }

        let mut sub_proofs = Vec::with_capacity(states.len());
        for (predicate, state) in spec.predicates().iter().zip(states.into_iter()) {
            let sub_proof = match (predicate, state) {
                (_, PredicateState::Cl(state)) => SubProof::Cl(cl_predicate::finalize(state, &c)?),
                (Predicate::Inequality(p), PredicateState::Inequality(state)) => {
                    let m_hat = m_hats.get(&p.identifier).ok_or_else(|| {
                        err_msg(
                            UrsaCryptoErrorKind::InvalidStructure,
                            format!("Identifier {} must be hidden", p.identifier),
                        )
                    })?;
                    SubProof::Inequality(inequality_predicate::finalize(state, &c, m_hat)?)
                }
                (_, PredicateState::Commitment(state)) => {
                    SubProof::Commitment(commitment_predicate::finalize(state, &c)?)
                }
                (_, PredicateState::Representation) => SubProof::Representation(RepresentationProof {}),
                (_, PredicateState::VerifiableEncryption(state)) => {
                    SubProof::VerifiableEncryption(verifiable_encryption_predicate::finalize(state, &c)?)
                }
                (_, PredicateState::Pseudonym(state)) => SubProof::Pseudonym(pseudonym_predicate::finalize(state, &c)?),
                (_, PredicateState::DomainPseudonym(proof)) => SubProof::DomainPseudonym(proof),
                (_, PredicateState::Inequality(_)) => {
                    return Err(err_msg(UrsaCryptoErrorKind::InvalidState, "Predicate state out of order"))
                }
            };
            sub_proofs.push(sub_proof);
        }

        let ms_hat = if spec.uses_master_secret() {
            Some(response(&ctx.ms_tilde, &c, self.master_secret.value())?)
        } else {
            None
        };

        let proof = Proof {
            c,
            ms_hat,
            m_hats,
            revealed_values,
            sub_proofs,
        };

        trace!("Prover::build_proof: <<< proof: {:?}", proof);

        Ok(proof)
    }

    fn _commitment_opening(&self, name: &str) -> UrsaCryptoResult<&'a CommitmentOpening> {
        self.commitment_openings.get(name).cloned().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Commitment opening {} not added", name),
            )
        })
    }

    fn _representation_opening(&self, name: &str) -> UrsaCryptoResult<&'a RepresentationOpening> {
        self.representation_openings.get(name).cloned().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Representation opening {} not added", name),
            )
        })
    }

    /// Values of every identifier, as supplied by credentials and openings.
    /// Two sources disagreeing on a value make the statement unsatisfiable.
    fn _identifier_values(&self) -> UrsaCryptoResult<BTreeMap<String, BigNumber>> {
        let mut values: BTreeMap<String, BigNumber> = BTreeMap::new();

        let mut record = |identifier: &String, value: &BigNumber| -> UrsaCryptoResult<()> {
            match values.get(identifier) {
                Some(existing) if existing != value => Err(err_msg(
                    UrsaCryptoErrorKind::StatementUnsatisfiable,
                    format!("Identifier {} is bound to different values", identifier),
                )),
                Some(_) => Ok(()),
                None => {
                    values.insert(identifier.clone(), value.clone());
                    Ok(())
                }
            }
        };

        for predicate in self.spec.predicates() {
            match predicate {
                Predicate::Cl(p) => {
                    let credential = self.credentials.get(&p.credential).ok_or_else(|| {
                        err_msg(
                            UrsaCryptoErrorKind::InvalidStructure,
                            format!("Credential {} not added", p.credential),
                        )
                    })?;
                    for (attr, identifier) in p.attributes.iter() {
                        let value = credential.value(attr).ok_or_else(|| {
                            err_msg(
                                UrsaCryptoErrorKind::InvalidStructure,
                                format!("Credential {} has no value for {}", p.credential, attr),
                            )
                        })?;
                        record(identifier, value)?;
                    }
                }
                Predicate::Commitment(p) => {
                    let opening = self._commitment_opening(&p.name)?;
                    commitment_predicate::check_opening(p, opening)?;
                    for (identifier, value) in p.identifiers.iter().zip(opening.messages().iter()) {
                        record(identifier, value)?;
                    }
                }
                Predicate::Representation(p) => {
                    let opening = self._representation_opening(&p.name)?;
                    representation_predicate::check_opening(p, opening)?;
                    for (identifier, value) in p.identifiers.iter().zip(opening.exponents.iter()) {
                        record(identifier, value)?;
                    }
                }
                _ => {}
            }
        }

        Ok(values)
    }

    /// Range of every value and truth of every inequality, before any randomizer is drawn.
    fn _check_statements(&self, values: &BTreeMap<String, BigNumber>) -> UrsaCryptoResult<()> {
        let l_m = self.spec.group().system.l_m;

        for (identifier, value) in values.iter() {
            if value.is_negative() || value.num_bits()? > l_m {
                return Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Value of {} is out of range", identifier),
                ));
            }
        }

        for predicate in self.spec.predicates() {
            if let Predicate::Inequality(p) = predicate {
                check_numeric_identifier(self.spec.predicates(), &p.identifier)?;
                let value = values.get(&p.identifier).ok_or_else(|| {
                    err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("No value for identifier {}", p.identifier),
                    )
                })?;
                if let Err(err) = inequality_predicate::delta(p, value) {
                    debug!("Prover::build_proof: {}", err);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}
