pub use super::predicates::cl::{ClPredicate, ClProof};
pub use super::predicates::commitment::{CommitmentPredicate, CommitmentProof};
pub use super::predicates::inequality::{InequalityOperator, InequalityPredicate, InequalityProof};
pub use super::predicates::pseudonym::{
    domain_pseudonym, scope_base, DomainPseudonymPredicate, DomainPseudonymProof, PseudonymOpening,
    PseudonymPredicate, PseudonymProof,
};
pub use super::predicates::representation::{RepresentationPredicate, RepresentationProof};
pub use super::predicates::verifiable_encryption::{VerifiableEncryptionPredicate, VerifiableEncryptionProof};

use super::helpers::calc_proof_context;
use super::{GroupParameters, IssuerPublicKey};
use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::collections::{BTreeMap, BTreeSet};
use std::convert::TryFrom;

/// Named value shared between predicates of one proof. Revealed identifiers are disclosed
/// to the verifier, hidden ones are linked through a common response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub revealed: bool,
}

impl Identifier {
    pub fn hidden(name: &str) -> Identifier {
        Identifier {
            name: name.to_owned(),
            revealed: false,
        }
    }

    pub fn revealed(name: &str) -> Identifier {
        Identifier {
            name: name.to_owned(),
            revealed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    Cl(ClPredicate),
    Inequality(InequalityPredicate),
    Commitment(CommitmentPredicate),
    Representation(RepresentationPredicate),
    VerifiableEncryption(VerifiableEncryptionPredicate),
    Pseudonym(PseudonymPredicate),
    DomainPseudonym(DomainPseudonymPredicate),
}

impl Predicate {
    /// Identifiers the predicate refers to.
    fn identifiers(&self) -> Vec<&String> {
        match self {
            Predicate::Cl(p) => p.attributes.values().collect(),
            Predicate::Inequality(p) => vec![&p.identifier],
            Predicate::Commitment(p) => p.identifiers.iter().collect(),
            Predicate::Representation(p) => p.identifiers.iter().collect(),
            Predicate::VerifiableEncryption(p) => vec![&p.identifier],
            Predicate::Pseudonym(_) | Predicate::DomainPseudonym(_) => Vec::new(),
        }
    }

    /// Identifiers whose value the predicate itself supplies.
    fn provided_identifiers(&self) -> Vec<&String> {
        match self {
            Predicate::Cl(_) | Predicate::Commitment(_) | Predicate::Representation(_) => self.identifiers(),
            _ => Vec::new(),
        }
    }

    /// Name under which the predicate's own value is registered, if any.
    fn name(&self) -> Option<(&'static str, &String)> {
        match self {
            Predicate::Cl(p) => Some(("credential", &p.credential)),
            Predicate::Commitment(p) => Some(("commitment", &p.name)),
            Predicate::Representation(p) => Some(("representation", &p.name)),
            Predicate::VerifiableEncryption(p) => Some(("verifiable encryption", &p.name)),
            Predicate::Pseudonym(p) => Some(("pseudonym", &p.name)),
            Predicate::DomainPseudonym(p) => Some(("domain pseudonym", &p.scope)),
            Predicate::Inequality(_) => None,
        }
    }

    fn issuer_key(&self) -> Option<&IssuerPublicKey> {
        match self {
            Predicate::Cl(p) => Some(&p.public_key),
            Predicate::Inequality(p) => Some(&p.public_key),
            _ => None,
        }
    }
}

/// Response bundle of one predicate, in the same position as its predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubProof {
    Cl(ClProof),
    Inequality(InequalityProof),
    Commitment(CommitmentProof),
    Representation(RepresentationProof),
    VerifiableEncryption(VerifiableEncryptionProof),
    Pseudonym(PseudonymProof),
    DomainPseudonym(DomainPseudonymProof),
}

/// Statement a proof is built and verified against. Immutable once finalized.
///
/// Deserialization goes through `ProofSpecBuilder::finalize`, so a received spec is checked
/// like a locally built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProofSpecBuilder")]
pub struct ProofSpec {
    group: GroupParameters,
    identifiers: Vec<Identifier>,
    predicates: Vec<Predicate>,
    messages: BTreeMap<String, String>,
}

impl ProofSpec {
    pub fn group(&self) -> &GroupParameters {
        &self.group
    }

    pub fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }

    pub fn identifier(&self, name: &str) -> Option<&Identifier> {
        self.identifiers.iter().find(|identifier| identifier.name == name)
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn messages(&self) -> &BTreeMap<String, String> {
        &self.messages
    }

    /// Hash of the group parameters and every distinct issuer key, in predicate order.
    pub fn context(&self) -> UrsaCryptoResult<BigNumber> {
        let public_keys: Vec<&IssuerPublicKey> = self.predicates.iter().filter_map(Predicate::issuer_key).collect();
        calc_proof_context(&self.group, &public_keys)
    }

    pub(crate) fn uses_master_secret(&self) -> bool {
        self.predicates.iter().any(|predicate| match predicate {
            Predicate::Cl(_) | Predicate::Pseudonym(_) | Predicate::DomainPseudonym(_) => true,
            _ => false,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProofSpecBuilder {
    group: GroupParameters,
    identifiers: Vec<Identifier>,
    predicates: Vec<Predicate>,
    messages: BTreeMap<String, String>,
}

impl ProofSpecBuilder {
    pub fn new(group: &GroupParameters) -> ProofSpecBuilder {
        ProofSpecBuilder {
            group: group.clone(),
            identifiers: Vec::new(),
            predicates: Vec::new(),
            messages: BTreeMap::new(),
        }
    }

    pub fn add_identifier(&mut self, identifier: Identifier) -> UrsaCryptoResult<()> {
        if self.identifiers.iter().any(|i| i.name == identifier.name) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Identifier {} already defined", identifier.name),
            ));
        }
        self.identifiers.push(identifier);
        Ok(())
    }

    pub fn add_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Binds `text` into the challenge under `name`.
    pub fn add_message(&mut self, name: &str, text: &str) {
        self.messages.insert(name.to_owned(), text.to_owned());
    }

    pub fn finalize(self) -> UrsaCryptoResult<ProofSpec> {
        trace!(
            "ProofSpecBuilder::finalize: >>> identifiers: {:?}, predicates: {}",
            self.identifiers,
            self.predicates.len()
        );

        let revealed: BTreeMap<&String, bool> = self.identifiers.iter().map(|i| (&i.name, i.revealed)).collect();
        let mut provided = BTreeSet::new();
        let mut names = BTreeSet::new();

        for predicate in self.predicates.iter() {
            for identifier in predicate.identifiers() {
                if !revealed.contains_key(identifier) {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Predicate refers to unknown identifier {}", identifier),
                    ));
                }
            }
            provided.extend(predicate.provided_identifiers());

            if let Some((kind, name)) = predicate.name() {
                if !names.insert((kind, name)) {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Duplicate {} {}", kind, name),
                    ));
                }
            }

            if let Some(public_key) = predicate.issuer_key() {
                public_key.validate()?;
                if public_key.group != self.group {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        "Issuer key belongs to other group parameters",
                    ));
                }
            }

            self._check_predicate(predicate, &revealed)?;
        }

        if let Some(identifier) = self.identifiers.iter().find(|i| !provided.contains(&i.name)) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("No credential, commitment or representation supplies {}", identifier.name),
            ));
        }

        let spec = ProofSpec {
            group: self.group,
            identifiers: self.identifiers,
            predicates: self.predicates,
            messages: self.messages,
        };

        trace!("ProofSpecBuilder::finalize: <<<");

        Ok(spec)
    }

    fn _check_predicate(&self, predicate: &Predicate, revealed: &BTreeMap<&String, bool>) -> UrsaCryptoResult<()> {
        let must_be_hidden = |identifier: &String| -> UrsaCryptoResult<()> {
            if revealed.get(identifier).cloned().unwrap_or(false) {
                return Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Identifier {} must be hidden", identifier),
                ));
            }
            Ok(())
        };

        match predicate {
            Predicate::Cl(p) => {
                for attr in p.attributes.keys() {
                    if p.structure.attribute(attr).is_none() {
                        return Err(err_msg(
                            UrsaCryptoErrorKind::InvalidStructure,
                            format!("Credential {} has no attribute {}", p.credential, attr),
                        ));
                    }
                }
                if p.structure.attributes().len() > p.public_key.attribute_capacity() {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Credential {} exceeds its issuer key", p.credential),
                    ));
                }
            }
            Predicate::Inequality(p) => {
                must_be_hidden(&p.identifier)?;
                check_numeric_identifier(&self.predicates, &p.identifier)?;
            }
            Predicate::VerifiableEncryption(p) => must_be_hidden(&p.identifier)?,
            Predicate::Commitment(p) => {
                if p.identifiers.len() != p.key.bases.len() {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Commitment {} has {} bases for {} identifiers", p.name, p.key.bases.len(), p.identifiers.len()),
                    ));
                }
            }
            Predicate::Representation(p) => {
                if p.identifiers.len() != p.representation.bases.len() {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Representation {} has {} bases for {} identifiers", p.name, p.representation.bases.len(), p.identifiers.len()),
                    ));
                }
            }
            Predicate::Pseudonym(_) | Predicate::DomainPseudonym(_) => {}
        }

        Ok(())
    }
}

impl TryFrom<ProofSpecBuilder> for ProofSpec {
    type Error = UrsaCryptoError;

    fn try_from(builder: ProofSpecBuilder) -> UrsaCryptoResult<ProofSpec> {
        builder.finalize()
    }
}

/// Range statements need an order-preserving encoding: every credential attribute
/// bound to `identifier` must be numeric.
pub(crate) fn check_numeric_identifier(predicates: &[Predicate], identifier: &str) -> UrsaCryptoResult<()> {
    for predicate in predicates {
        if let Predicate::Cl(p) = predicate {
            for (attr, _) in p.attributes.iter().filter(|(_, id)| id.as_str() == identifier) {
                let numeric = p
                    .structure
                    .attribute(attr)
                    .map_or(false, |(_, structure)| structure.data_type.is_numeric());
                if !numeric {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Identifier {} is bound to non-numeric attribute {}", identifier, attr),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Non-interactive show proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub c: BigNumber,
    /// Master secret response, present when a predicate involves the master secret.
    pub ms_hat: Option<BigNumber>,
    /// Responses of hidden identifiers.
    pub m_hats: BTreeMap<String, BigNumber>,
    pub revealed_values: BTreeMap<String, BigNumber>,
    pub sub_proofs: Vec<SubProof>,
}


#[cfg(test)]
mod tests {
    use super::mocks::*;
    use super::*;
    use crate::cl::issuer::mocks::*;

    fn cl_predicate(attributes: &[(&str, &str)]) -> Predicate {
        Predicate::Cl(ClPredicate {
            credential: "id".to_string(),
            public_key: ISSUER_KEY_PAIR.public_key.clone(),
            structure: credential_structure(),
            attributes: attributes
                .iter()
                .map(|(attr, id)| (attr.to_string(), id.to_string()))
                .collect(),
        })
    }

    #[test]
    fn finalize_works() {
        let spec = age_spec(18);
        assert_eq!(2, spec.identifiers().len());
        assert_eq!(2, spec.predicates().len());
        assert!(spec.uses_master_secret());
        assert!(spec.identifier("name").unwrap().revealed);
        assert_eq!(spec.context().unwrap(), age_spec(21).context().unwrap());
    }

    #[test]
    fn add_identifier_rejects_duplicates() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("age")).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.add_identifier(Identifier::revealed("age")).unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_rejects_unknown_identifier() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_predicate(cl_predicate(&[("age", "age")]));
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.finalize().unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_rejects_unsupplied_identifier() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("age")).unwrap();
        builder.add_predicate(Predicate::Inequality(InequalityPredicate {
            identifier: "age".to_string(),
            operator: InequalityOperator::Gt,
            boundary: BigNumber::from_u32(18).unwrap(),
            public_key: ISSUER_KEY_PAIR.public_key.clone(),
        }));
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.finalize().unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_rejects_revealed_inequality_identifier() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::revealed("age")).unwrap();
        builder.add_predicate(cl_predicate(&[("age", "age")]));
        builder.add_predicate(Predicate::Inequality(InequalityPredicate {
            identifier: "age".to_string(),
            operator: InequalityOperator::Lt,
            boundary: BigNumber::from_u32(65).unwrap(),
            public_key: ISSUER_KEY_PAIR.public_key.clone(),
        }));
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.finalize().unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_rejects_unknown_attribute_and_duplicate_credential() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("x")).unwrap();
        builder.add_predicate(cl_predicate(&[("height", "x")]));
        assert!(builder.finalize().is_err());

        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("age")).unwrap();
        builder.add_predicate(cl_predicate(&[("age", "age")]));
        builder.add_predicate(cl_predicate(&[]));
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.finalize().unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_checks_commitment_arity() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("x")).unwrap();
        builder.add_predicate(Predicate::Commitment(CommitmentPredicate {
            name: "C".to_string(),
            key: ISSUER_KEY_PAIR.public_key.commitment_key(2).unwrap(),
            identifiers: vec!["x".to_string()],
        }));
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            builder.finalize().unwrap_err().kind()
        );
    }

    #[test]
    fn finalize_rejects_inequality_on_non_numeric_attribute() {
        for attr in &["name", "status"] {
            let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
            builder.add_identifier(Identifier::hidden(attr)).unwrap();
            builder.add_predicate(cl_predicate(&[(*attr, *attr)]));
            builder.add_predicate(Predicate::Inequality(InequalityPredicate {
                identifier: attr.to_string(),
                operator: InequalityOperator::Geq,
                boundary: BigNumber::from_u32(1).unwrap(),
                public_key: ISSUER_KEY_PAIR.public_key.clone(),
            }));
            assert_eq!(
                UrsaCryptoErrorKind::InvalidStructure,
                builder.finalize().unwrap_err().kind()
            );
        }
    }

    #[test]
    fn deserialized_spec_is_checked() {
        let spec = age_spec(18);
        let json = serde_json::to_value(&spec).unwrap();
        let restored: ProofSpec = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(spec, restored);

        let mut no_bases = json.clone();
        no_bases["predicates"][0]["Cl"]["public_key"]["r"] = serde_json::json!([]);
        assert!(serde_json::from_value::<ProofSpec>(no_bases).is_err());

        let mut revealed_age = json;
        revealed_age["identifiers"][1]["revealed"] = serde_json::json!(true);
        assert!(serde_json::from_value::<ProofSpec>(revealed_age).is_err());
    }

    #[test]
    fn spec_without_credential_skips_master_secret() {
        let mut builder = ProofSpecBuilder::new(&GROUP_PARAMETERS);
        builder.add_identifier(Identifier::hidden("x")).unwrap();
        builder.add_predicate(Predicate::Commitment(CommitmentPredicate {
            name: "C".to_string(),
            key: ISSUER_KEY_PAIR.public_key.commitment_key(1).unwrap(),
            identifiers: vec!["x".to_string()],
        }));
        let spec = builder.finalize().unwrap();
        assert!(!spec.uses_master_secret());
    }
}
