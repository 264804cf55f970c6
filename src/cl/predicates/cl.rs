use super::{response, Commitments, IdentifierResponse, ProverContext, VerifierContext};
use crate::bn::BigNumber;
use crate::cl::helpers::{bn_rand, check_bit_length};
use crate::cl::{Credential, CredentialStructure, IssuerPublicKey};
use crate::errors::prelude::*;

use std::collections::BTreeMap;

/// Possession of a credential, with attributes linked to identifiers.
///
/// Attributes without an identifier stay hidden and are not linked to anything else in the proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClPredicate {
    pub credential: String,
    pub public_key: IssuerPublicKey,
    pub structure: CredentialStructure,
    /// attribute name -> identifier name
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClProof {
    pub a_prime: BigNumber,
    pub e_hat: BigNumber,
    pub v_hat: BigNumber,
    /// Responses for attributes not linked to an identifier.
    pub m_hats: BTreeMap<String, BigNumber>,
}

#[derive(Debug)]
pub(crate) struct ClProverState {
    a_prime: BigNumber,
    e_prime: BigNumber,
    v_prime: BigNumber,
    e_tilde: BigNumber,
    v_tilde: BigNumber,
    unlinked: BTreeMap<String, (BigNumber, BigNumber)>,
}

/// Randomizes the signature to `(A', e', v')` and commits to the hidden exponents.
pub(crate) fn init(
    predicate: &ClPredicate,
    credential: &Credential,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, ClProverState)> {
    trace!(
        "ClPredicate::init: >>> credential: {:?}, attributes: {:?}",
        predicate.credential,
        predicate.attributes
    );

    if *credential.public_key() != predicate.public_key || *credential.structure() != predicate.structure {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Credential {} does not match its predicate", predicate.credential),
        ));
    }

    let public_key = &predicate.public_key;
    let system = ctx.system();
    let signature = credential.signature();
    let mut bn_ctx = BigNumber::new_context()?;

    let r_a = bn_rand(system.l_r_a())?;
    let a_prime = BigNumber::multi_mod_exp(
        &[(&signature.a, &BigNumber::from_u32(1)?), (&public_key.s, &r_a)],
        &public_key.n,
        Some(&mut bn_ctx),
    )?;
    let v_prime = signature.v.sub(&signature.e.mul(&r_a, Some(&mut bn_ctx))?)?;
    let e_prime = signature.e.sub(&BigNumber::power_of_two(system.l_e - 1)?)?;

    let e_tilde = bn_rand(system.l_e_tilde())?;
    let v_tilde = bn_rand(system.l_v_tilde())?;

    let mut unlinked = BTreeMap::new();
    for attr in predicate.structure.attributes() {
        if !predicate.attributes.contains_key(&attr.name) {
            let value = credential.value(&attr.name).ok_or_else(|| {
                err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Credential has no value for {}", attr.name),
                )
            })?;
            unlinked.insert(attr.name.clone(), (bn_rand(system.l_m_tilde())?, value.clone()));
        }
    }

    let mut pairs = vec![
        (&a_prime, &e_tilde),
        (&public_key.s, &v_tilde),
        (public_key.base(0)?, &ctx.ms_tilde),
    ];
    for (i, attr) in predicate.structure.attributes().iter().enumerate() {
        let tilde = match predicate.attributes.get(&attr.name) {
            Some(identifier) => ctx.identifier(identifier)?.tilde.as_ref(),
            None => unlinked.get(&attr.name).map(|(tilde, _)| tilde),
        };
        if let Some(tilde) = tilde {
            pairs.push((public_key.base(i + 1)?, tilde));
        }
    }
    let t = BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut bn_ctx))?;

    let commitments = Commitments {
        t_values: vec![t],
        common_values: vec![a_prime.clone()],
    };
    let state = ClProverState {
        a_prime,
        e_prime,
        v_prime,
        e_tilde,
        v_tilde,
        unlinked,
    };

    trace!("ClPredicate::init: <<< commitments: {:?}", commitments);

    Ok((commitments, state))
}

pub(crate) fn finalize(state: ClProverState, c: &BigNumber) -> UrsaCryptoResult<ClProof> {
    let mut m_hats = BTreeMap::new();
    for (name, (tilde, value)) in state.unlinked.iter() {
        m_hats.insert(name.clone(), response(tilde, c, value)?);
    }

    Ok(ClProof {
        e_hat: response(&state.e_tilde, c, &state.e_prime)?,
        v_hat: response(&state.v_tilde, c, &state.v_prime)?,
        a_prime: state.a_prime,
        m_hats,
    })
}

/// `(Z / (A'^(2^(l_e - 1)) * ∏_revealed R[i]^m_i))^-c * A'^ê * S^v̂ * R[0]^m̂s * ∏_hidden R[i]^m̂_i`
pub(crate) fn verify(predicate: &ClPredicate, proof: &ClProof, ctx: &VerifierContext) -> UrsaCryptoResult<Commitments> {
    trace!("ClPredicate::verify: >>> proof: {:?}", proof);

    let public_key = &predicate.public_key;
    let system = ctx.system();

    let unlinked = predicate
        .structure
        .attributes()
        .iter()
        .filter(|attr| !predicate.attributes.contains_key(&attr.name))
        .count();
    if unlinked != proof.m_hats.len() {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            "Responses do not match the unlinked attributes",
        ));
    }

    if !check_bit_length(&proof.e_hat, system.l_e_tilde() + 1)? {
        return Err(err_msg(UrsaCryptoErrorKind::ProofRejected, "ê is too long"));
    }

    let two_l_e = BigNumber::power_of_two(system.l_e - 1)?;
    let mut revealed = vec![(&proof.a_prime, &two_l_e)];
    let mut hidden = vec![
        (&proof.a_prime, &proof.e_hat),
        (&public_key.s, &proof.v_hat),
        (public_key.base(0)?, ctx.ms_hat()?),
    ];

    for (i, attr) in predicate.structure.attributes().iter().enumerate() {
        let base = public_key.base(i + 1)?;
        match predicate.attributes.get(&attr.name) {
            Some(identifier) => match ctx.response(identifier)? {
                IdentifierResponse::Hidden(m_hat) => hidden.push((base, m_hat)),
                IdentifierResponse::Revealed(value) => revealed.push((base, value)),
            },
            None => {
                let m_hat = proof.m_hats.get(&attr.name).ok_or_else(|| {
                    err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("No response for attribute {}", attr.name),
                    )
                })?;
                if !check_bit_length(m_hat, system.l_m_tilde() + 1)? {
                    return Err(err_msg(UrsaCryptoErrorKind::ProofRejected, "m̂ is too long"));
                }
                hidden.push((base, m_hat));
            }
        }
    }

    let t_hat = super::reconstruct_t_value(&public_key.z, &revealed, &hidden, &ctx.minus_c, &public_key.n)?;

    trace!("ClPredicate::verify: <<< t_hat: {:?}", t_hat);

    Ok(Commitments {
        t_values: vec![t_hat],
        common_values: vec![proof.a_prime.clone()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cl::issuer::mocks::*;
    use crate::cl::predicates::IdentifierSecret;
    use crate::cl::recipient::mocks::issue_credential;
    use crate::cl::MasterSecret;

    #[test]
    fn t_value_is_recomputed_from_responses() {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (credential, _) = issue_credential(&master_secret);
        let system = &GROUP_PARAMETERS.system;

        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), "name".to_string());
        attributes.insert("age".to_string(), "age".to_string());
        let predicate = ClPredicate {
            credential: "id".to_string(),
            public_key: credential.public_key().clone(),
            structure: credential.structure().clone(),
            attributes,
        };

        let age_tilde = bn_rand(system.l_m_tilde()).unwrap();
        let mut identifiers = BTreeMap::new();
        identifiers.insert(
            "name".to_string(),
            IdentifierSecret {
                value: credential.values()["name"].clone(),
                tilde: None,
            },
        );
        identifiers.insert(
            "age".to_string(),
            IdentifierSecret {
                value: credential.values()["age"].clone(),
                tilde: Some(age_tilde.clone()),
            },
        );
        let prover_ctx = ProverContext {
            group: &GROUP_PARAMETERS,
            master_secret: &master_secret,
            ms_tilde: bn_rand(system.l_m_tilde()).unwrap(),
            identifiers,
        };

        let (commitments, state) = init(&predicate, &credential, &prover_ctx).unwrap();
        let c = bn_rand(system.l_h).unwrap();
        let proof = finalize(state, &c).unwrap();
        assert_eq!(2, proof.m_hats.len());

        let ms_hat = response(&prover_ctx.ms_tilde, &c, master_secret.value()).unwrap();
        let mut m_hats = BTreeMap::new();
        m_hats.insert(
            "age".to_string(),
            response(&age_tilde, &c, &credential.values()["age"]).unwrap(),
        );
        let mut revealed_values = BTreeMap::new();
        revealed_values.insert("name".to_string(), credential.values()["name"].clone());

        let verifier_ctx = VerifierContext {
            group: &GROUP_PARAMETERS,
            challenge: &c,
            minus_c: c.set_negative(true).unwrap(),
            ms_hat: Some(&ms_hat),
            m_hats: &m_hats,
            revealed_values: &revealed_values,
        };
        assert_eq!(commitments, verify(&predicate, &proof, &verifier_ctx).unwrap());

        let mut wrong = revealed_values.clone();
        wrong.insert("name".to_string(), BigNumber::from_u32(1).unwrap());
        let verifier_ctx = VerifierContext {
            revealed_values: &wrong,
            ..verifier_ctx
        };
        assert_ne!(commitments, verify(&predicate, &proof, &verifier_ctx).unwrap());

        let mut stripped = predicate.clone();
        stripped.public_key.r.clear();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            verify(&stripped, &proof, &verifier_ctx).unwrap_err().kind()
        );
    }
}
