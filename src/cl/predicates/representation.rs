use super::{Commitments, IdentifierResponse, ProverContext, VerifierContext};
use crate::bn::BigNumber;
use crate::cl::{Representation, RepresentationOpening};
use crate::errors::prelude::*;

/// Knowledge of exponents `x_i` with `value = ∏ bases[i]^x_i`, exponent `i` linked to `identifiers[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationPredicate {
    pub name: String,
    pub representation: Representation,
    pub identifiers: Vec<String>,
}

/// Responses live with the linked identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationProof {}

pub(crate) fn check_opening(
    predicate: &RepresentationPredicate,
    opening: &RepresentationOpening,
) -> UrsaCryptoResult<()> {
    if opening.exponents.len() != predicate.identifiers.len() || !predicate.representation.verify_opening(opening)? {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Opening does not fit representation {}", predicate.name),
        ));
    }
    Ok(())
}

pub(crate) fn init(
    predicate: &RepresentationPredicate,
    opening: &RepresentationOpening,
    ctx: &ProverContext,
) -> UrsaCryptoResult<Commitments> {
    trace!("RepresentationPredicate::init: >>> name: {:?}", predicate.name);

    check_opening(predicate, opening)?;

    let representation = &predicate.representation;
    let mut pairs = Vec::with_capacity(predicate.identifiers.len());
    for (base, identifier) in representation.bases.iter().zip(predicate.identifiers.iter()) {
        if let Some(ref tilde) = ctx.identifier(identifier)?.tilde {
            pairs.push((base, tilde));
        }
    }
    let t = BigNumber::multi_mod_exp(&pairs, &representation.modulus, None)?;

    let commitments = Commitments {
        t_values: vec![t],
        common_values: vec![representation.value.clone()],
    };

    trace!("RepresentationPredicate::init: <<< commitments: {:?}", commitments);

    Ok(commitments)
}

pub(crate) fn verify(predicate: &RepresentationPredicate, ctx: &VerifierContext) -> UrsaCryptoResult<Commitments> {
    let representation = &predicate.representation;

    let mut revealed = Vec::new();
    let mut hidden = Vec::new();
    for (base, identifier) in representation.bases.iter().zip(predicate.identifiers.iter()) {
        match ctx.response(identifier)? {
            IdentifierResponse::Hidden(m_hat) => hidden.push((base, m_hat)),
            IdentifierResponse::Revealed(value) => revealed.push((base, value)),
        }
    }

    let t_hat = super::reconstruct_t_value(
        &representation.value,
        &revealed,
        &hidden,
        &ctx.minus_c,
        &representation.modulus,
    )?;

    Ok(Commitments {
        t_values: vec![t_hat],
        common_values: vec![representation.value.clone()],
    })
}
