//! Pseudonyms `g^ms * h^r` and scope-bound domain pseudonyms `H(scope)^((Γ-1)/ρ * ms)`,
//! both in the order `ρ` subgroup of `Z*_Γ`.
use super::{response, Commitments, ProverContext, VerifierContext};
use crate::bn::{BigNumber, BIGNUMBER_1};
use crate::cl::hash::get_hash_as_int;
use crate::cl::helpers::{bn_rand, bn_rand_range};
use crate::cl::{GroupParameters, MasterSecret};
use crate::errors::prelude::*;

/// Ownership of a pseudonym opened by the prover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymPredicate {
    pub name: String,
}

/// The prover's master secret underlies the domain pseudonym for `scope`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPseudonymPredicate {
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudonymProof {
    pub nym: BigNumber,
    pub r_hat: BigNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPseudonymProof {
    pub d_nym: BigNumber,
}

/// A pseudonym together with the randomness it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PseudonymOpening {
    nym: BigNumber,
    randomness: BigNumber,
}

impl PseudonymOpening {
    /// Fresh pseudonym `g^ms * h^r mod Γ` with `r` uniform modulo `ρ`.
    pub fn new(master_secret: &MasterSecret, group: &GroupParameters) -> UrsaCryptoResult<PseudonymOpening> {
        trace!("PseudonymOpening::new: >>>");

        master_secret.check_group(group)?;

        let randomness = bn_rand_range(&group.rho)?;
        let nym = _pseudonym(master_secret.value(), &randomness, group)?;

        trace!("PseudonymOpening::new: <<< nym: {:?}", nym);

        Ok(PseudonymOpening { nym, randomness })
    }

    pub fn nym(&self) -> &BigNumber {
        &self.nym
    }

    pub fn verify(&self, master_secret: &MasterSecret, group: &GroupParameters) -> UrsaCryptoResult<bool> {
        Ok(_pseudonym(master_secret.value(), &self.randomness, group)? == self.nym)
    }
}

fn _pseudonym(ms: &BigNumber, r: &BigNumber, group: &GroupParameters) -> UrsaCryptoResult<BigNumber> {
    BigNumber::multi_mod_exp(&[(&group.g, ms), (&group.h, r)], &group.capital_gamma, None)
}

/// `H(scope)^((Γ-1)/ρ) mod Γ`. Fails when the scope hashes outside the subgroup generators.
pub fn scope_base(group: &GroupParameters, scope: &str) -> UrsaCryptoResult<BigNumber> {
    let hash = get_hash_as_int(&[scope.as_bytes().to_vec()])?;
    let cofactor = group.capital_gamma.decrement()?.div(&group.rho, None)?;
    let base = hash.mod_exp(&cofactor, &group.capital_gamma, None)?;

    if base == *BIGNUMBER_1 || base.is_zero() {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Scope {:?} does not yield a subgroup generator", scope),
        ));
    }

    Ok(base)
}

/// The holder's domain pseudonym for `scope`. Stable across proofs for the same scope.
pub fn domain_pseudonym(
    master_secret: &MasterSecret,
    group: &GroupParameters,
    scope: &str,
) -> UrsaCryptoResult<BigNumber> {
    master_secret.check_group(group)?;
    scope_base(group, scope)?.mod_exp(master_secret.value(), &group.capital_gamma, None)
}

fn _check_subgroup_element(value: &BigNumber, group: &GroupParameters, what: &str) -> UrsaCryptoResult<()> {
    if value.is_zero()
        || value.is_negative()
        || *value >= group.capital_gamma
        || value.mod_exp(&group.rho, &group.capital_gamma, None)? != *BIGNUMBER_1
    {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            format!("{} is not in the pseudonym group", what),
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct PseudonymProverState {
    nym: BigNumber,
    randomness: BigNumber,
    r_tilde: BigNumber,
}

pub(crate) fn init(
    predicate: &PseudonymPredicate,
    opening: &PseudonymOpening,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, PseudonymProverState)> {
    trace!("PseudonymPredicate::init: >>> name: {:?}", predicate.name);

    let group = ctx.group;
    if !opening.verify(ctx.master_secret, group)? {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Pseudonym {} was not built from this master secret", predicate.name),
        ));
    }

    let system = ctx.system();
    let r_tilde = bn_rand(system.l_rho + system.l_phi + system.l_h)?;
    let t = BigNumber::multi_mod_exp(
        &[(&group.g, &ctx.ms_tilde), (&group.h, &r_tilde)],
        &group.capital_gamma,
        None,
    )?;

    let commitments = Commitments {
        t_values: vec![t],
        common_values: vec![opening.nym.clone()],
    };
    let state = PseudonymProverState {
        nym: opening.nym.clone(),
        randomness: opening.randomness.clone(),
        r_tilde,
    };

    Ok((commitments, state))
}

pub(crate) fn finalize(state: PseudonymProverState, c: &BigNumber) -> UrsaCryptoResult<PseudonymProof> {
    Ok(PseudonymProof {
        r_hat: response(&state.r_tilde, c, &state.randomness)?,
        nym: state.nym,
    })
}

/// `nym^-c * g^m̂s * h^r̂`
pub(crate) fn verify(
    predicate: &PseudonymPredicate,
    proof: &PseudonymProof,
    ctx: &VerifierContext,
) -> UrsaCryptoResult<Commitments> {
    trace!(
        "PseudonymPredicate::verify: >>> name: {:?}, proof: {:?}",
        predicate.name,
        proof
    );

    let group = ctx.group;
    _check_subgroup_element(&proof.nym, group, "Pseudonym")?;

    let t_hat = BigNumber::multi_mod_exp(
        &[
            (&proof.nym, &ctx.minus_c),
            (&group.g, ctx.ms_hat()?),
            (&group.h, &proof.r_hat),
        ],
        &group.capital_gamma,
        None,
    )?;

    Ok(Commitments {
        t_values: vec![t_hat],
        common_values: vec![proof.nym.clone()],
    })
}

pub(crate) fn init_domain(
    predicate: &DomainPseudonymPredicate,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, DomainPseudonymProof)> {
    trace!("DomainPseudonymPredicate::init: >>> scope: {:?}", predicate.scope);

    let group = ctx.group;
    let base = scope_base(group, &predicate.scope)?;
    let d_nym = base.mod_exp(ctx.master_secret.value(), &group.capital_gamma, None)?;
    let t = base.mod_exp(&ctx.ms_tilde, &group.capital_gamma, None)?;

    let commitments = Commitments {
        t_values: vec![t],
        common_values: vec![d_nym.clone()],
    };

    Ok((commitments, DomainPseudonymProof { d_nym }))
}

/// `dNym^-c * base^m̂s`
pub(crate) fn verify_domain(
    predicate: &DomainPseudonymPredicate,
    proof: &DomainPseudonymProof,
    ctx: &VerifierContext,
) -> UrsaCryptoResult<Commitments> {
    trace!(
        "DomainPseudonymPredicate::verify: >>> scope: {:?}, proof: {:?}",
        predicate.scope,
        proof
    );

    let group = ctx.group;
    _check_subgroup_element(&proof.d_nym, group, "Domain pseudonym")?;

    let base = scope_base(group, &predicate.scope)?;
    let t_hat = BigNumber::multi_mod_exp(
        &[(&proof.d_nym, &ctx.minus_c), (&base, ctx.ms_hat()?)],
        &group.capital_gamma,
        None,
    )?;

    Ok(Commitments {
        t_values: vec![t_hat],
        common_values: vec![proof.d_nym.clone()],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cl::params::mocks::GROUP_PARAMETERS;

    use std::collections::BTreeMap;

    fn contexts<'a>(
        master_secret: &'a MasterSecret,
    ) -> (ProverContext<'a>, BigNumber) {
        let system = &GROUP_PARAMETERS.system;
        let prover_ctx = ProverContext {
            group: &GROUP_PARAMETERS,
            master_secret,
            ms_tilde: bn_rand(system.l_m_tilde()).unwrap(),
            identifiers: BTreeMap::new(),
        };
        let c = bn_rand(system.l_h).unwrap();
        (prover_ctx, c)
    }

    #[test]
    fn pseudonym_opening_verifies_only_for_its_master_secret() {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let other = MasterSecret::new(&GROUP_PARAMETERS).unwrap();

        let opening = PseudonymOpening::new(&master_secret, &GROUP_PARAMETERS).unwrap();
        assert!(opening.verify(&master_secret, &GROUP_PARAMETERS).unwrap());
        assert!(!opening.verify(&other, &GROUP_PARAMETERS).unwrap());

        let second = PseudonymOpening::new(&master_secret, &GROUP_PARAMETERS).unwrap();
        assert_ne!(opening.nym(), second.nym());
    }

    #[test]
    fn pseudonym_t_value_is_recomputed() {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (prover_ctx, c) = contexts(&master_secret);
        let predicate = PseudonymPredicate { name: "nym".to_string() };
        let opening = PseudonymOpening::new(&master_secret, &GROUP_PARAMETERS).unwrap();

        let (commitments, state) = init(&predicate, &opening, &prover_ctx).unwrap();
        let proof = finalize(state, &c).unwrap();

        let ms_hat = response(&prover_ctx.ms_tilde, &c, master_secret.value()).unwrap();
        let empty = BTreeMap::new();
        let verifier_ctx = VerifierContext {
            group: &GROUP_PARAMETERS,
            challenge: &c,
            minus_c: c.set_negative(true).unwrap(),
            ms_hat: Some(&ms_hat),
            m_hats: &empty,
            revealed_values: &empty,
        };

        assert_eq!(commitments, verify(&predicate, &proof, &verifier_ctx).unwrap());

        let forged = PseudonymProof {
            nym: BigNumber::from_u32(0).unwrap(),
            r_hat: proof.r_hat.clone(),
        };
        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            verify(&predicate, &forged, &verifier_ctx).unwrap_err().kind()
        );
    }

    #[test]
    fn domain_pseudonym_is_stable_per_scope() {
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let (prover_ctx, c) = contexts(&master_secret);
        let predicate = DomainPseudonymPredicate {
            scope: "shop.example".to_string(),
        };

        let (commitments, proof) = init_domain(&predicate, &prover_ctx).unwrap();
        assert_eq!(
            domain_pseudonym(&master_secret, &GROUP_PARAMETERS, "shop.example").unwrap(),
            proof.d_nym
        );
        assert_ne!(
            domain_pseudonym(&master_secret, &GROUP_PARAMETERS, "bank.example").unwrap(),
            proof.d_nym
        );

        let ms_hat = response(&prover_ctx.ms_tilde, &c, master_secret.value()).unwrap();
        let empty = BTreeMap::new();
        let verifier_ctx = VerifierContext {
            group: &GROUP_PARAMETERS,
            challenge: &c,
            minus_c: c.set_negative(true).unwrap(),
            ms_hat: Some(&ms_hat),
            m_hats: &empty,
            revealed_values: &empty,
        };

        assert_eq!(commitments, verify_domain(&predicate, &proof, &verifier_ctx).unwrap());
    }
}
