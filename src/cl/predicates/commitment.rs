use super::{response, Commitments, IdentifierResponse, ProverContext, VerifierContext};
use crate::bn::BigNumber;
use crate::cl::helpers::{bn_rand, check_bit_length};
use crate::cl::{CommitmentKey, CommitmentOpening};
use crate::errors::prelude::*;

/// Knowledge of an opening of a commitment, message `j` linked to `identifiers[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentPredicate {
    pub name: String,
    pub key: CommitmentKey,
    pub identifiers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentProof {
    pub commitment: BigNumber,
    pub r_hat: BigNumber,
}

#[derive(Debug)]
pub(crate) struct CommitmentProverState {
    commitment: BigNumber,
    randomness: BigNumber,
    r_tilde: BigNumber,
}

pub(crate) fn check_opening(predicate: &CommitmentPredicate, opening: &CommitmentOpening) -> UrsaCryptoResult<()> {
    if *opening.key() != predicate.key || opening.messages().len() != predicate.identifiers.len() {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Opening does not fit commitment {}", predicate.name),
        ));
    }
    Ok(())
}

pub(crate) fn init(
    predicate: &CommitmentPredicate,
    opening: &CommitmentOpening,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, CommitmentProverState)> {
    trace!("CommitmentPredicate::init: >>> name: {:?}", predicate.name);

    check_opening(predicate, opening)?;

    let r_tilde = bn_rand(ctx.system().l_r_tilde())?;

    let mut pairs = Vec::with_capacity(predicate.identifiers.len() + 1);
    for (base, identifier) in predicate.key.bases.iter().zip(predicate.identifiers.iter()) {
        if let Some(ref tilde) = ctx.identifier(identifier)?.tilde {
            pairs.push((base, tilde));
        }
    }
    pairs.push((&predicate.key.s, &r_tilde));
    let t = BigNumber::multi_mod_exp(&pairs, &predicate.key.n, None)?;

    let commitments = Commitments {
        t_values: vec![t],
        common_values: vec![opening.commitment().clone()],
    };
    let state = CommitmentProverState {
        commitment: opening.commitment().clone(),
        randomness: opening.randomness().clone(),
        r_tilde,
    };

    trace!("CommitmentPredicate::init: <<< commitments: {:?}", commitments);

    Ok((commitments, state))
}

pub(crate) fn finalize(state: CommitmentProverState, c: &BigNumber) -> UrsaCryptoResult<CommitmentProof> {
    Ok(CommitmentProof {
        r_hat: response(&state.r_tilde, c, &state.randomness)?,
        commitment: state.commitment,
    })
}

/// `(C / ∏_revealed bases[j]^m_j)^-c * ∏_hidden bases[j]^m̂_j * S^r̂`
pub(crate) fn verify(
    predicate: &CommitmentPredicate,
    proof: &CommitmentProof,
    ctx: &VerifierContext,
) -> UrsaCryptoResult<Commitments> {
    trace!("CommitmentPredicate::verify: >>> proof: {:?}", proof);

    let key = &predicate.key;

    if proof.commitment.is_zero() || proof.commitment.is_negative() || proof.commitment >= key.n {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            format!("Commitment {} is out of range", predicate.name),
        ));
    }
    if !check_bit_length(&proof.r_hat, ctx.system().l_r_tilde() + 1)? {
        return Err(err_msg(UrsaCryptoErrorKind::ProofRejected, "r̂ is too long"));
    }

    let mut revealed = Vec::new();
    let mut hidden = Vec::new();
    for (base, identifier) in key.bases.iter().zip(predicate.identifiers.iter()) {
        match ctx.response(identifier)? {
            IdentifierResponse::Hidden(m_hat) => hidden.push((base, m_hat)),
            IdentifierResponse::Revealed(value) => revealed.push((base, value)),
        }
    }
    hidden.push((&key.s, &proof.r_hat));

    let t_hat = super::reconstruct_t_value(&proof.commitment, &revealed, &hidden, &ctx.minus_c, &key.n)?;

    Ok(Commitments {
        t_values: vec![t_hat],
        common_values: vec![proof.commitment.clone()],
    })
}
