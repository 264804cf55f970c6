use super::{response, Commitments, IdentifierResponse, ProverContext, VerifierContext};
use crate::bn::BigNumber;
use crate::cl::helpers::{bn_rand, four_squares};
use crate::cl::IssuerPublicKey;
use crate::errors::prelude::*;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InequalityOperator {
    /// m < b
    Lt,
    /// m <= b
    Leq,
    /// m > b
    Gt,
    /// m >= b
    Geq,
}

impl InequalityOperator {
    /// `(δ', a)` such that the statement holds iff `δ = a * (m - δ') >= 0`.
    pub(crate) fn delta_prime(self, boundary: &BigNumber) -> UrsaCryptoResult<(BigNumber, bool)> {
        match self {
            InequalityOperator::Leq => Ok((boundary.clone(), false)),
            InequalityOperator::Lt => Ok((boundary.decrement()?, false)),
            InequalityOperator::Geq => Ok((boundary.clone(), true)),
            InequalityOperator::Gt => Ok((boundary.increment()?, true)),
        }
    }
}

/// `identifier operator boundary`, proved with the four-square decomposition under an issuer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InequalityPredicate {
    pub identifier: String,
    pub operator: InequalityOperator,
    pub boundary: BigNumber,
    pub public_key: IssuerPublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InequalityProof {
    /// `T_0..T_3`
    pub t: Vec<BigNumber>,
    pub t_delta: BigNumber,
    /// `û_0..û_3` and `m̂`
    pub u_hat: Vec<BigNumber>,
    /// `r̂_0..r̂_3` and `r̂_Δ`
    pub r_hat: Vec<BigNumber>,
    pub alpha_hat: BigNumber,
}

#[derive(Debug)]
pub(crate) struct InequalityProverState {
    t: Vec<BigNumber>,
    t_delta: BigNumber,
    u: Vec<BigNumber>,
    r: Vec<BigNumber>,
    alpha: BigNumber,
    u_tilde: Vec<BigNumber>,
    r_tilde: Vec<BigNumber>,
    alpha_tilde: BigNumber,
}

/// `δ = a * (m - δ')`. Fails with `StatementUnsatisfiable` when the statement is false for `m`.
pub(crate) fn delta(predicate: &InequalityPredicate, m: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    let (delta_prime, positive) = predicate.operator.delta_prime(&predicate.boundary)?;

    let delta = if positive {
        m.sub(&delta_prime)?
    } else {
        delta_prime.sub(m)?
    };

    if delta.is_negative() {
        return Err(err_msg(
            UrsaCryptoErrorKind::StatementUnsatisfiable,
            format!(
                "{} {:?} {} does not hold",
                predicate.identifier, predicate.operator, predicate.boundary
            ),
        ));
    }

    Ok(delta)
}

pub(crate) fn init(
    predicate: &InequalityPredicate,
    ctx: &ProverContext,
) -> UrsaCryptoResult<(Commitments, InequalityProverState)> {
    trace!(
        "InequalityPredicate::init: >>> identifier: {:?}, operator: {:?}, boundary: {:?}",
        predicate.identifier,
        predicate.operator,
        predicate.boundary
    );

    let (m, m_tilde) = ctx.hidden(&predicate.identifier)?;
    let delta = delta(predicate, m)?;
    let (_, positive) = predicate.operator.delta_prime(&predicate.boundary)?;

    let public_key = &predicate.public_key;
    let system = ctx.system();
    let mut bn_ctx = BigNumber::new_context()?;

    let u = four_squares(&delta)?.to_vec();

    let mut r = Vec::with_capacity(5);
    let mut t = Vec::with_capacity(4);
    for u_i in u.iter() {
        let r_i = bn_rand(system.l_n)?;
        t.push(BigNumber::multi_mod_exp(
            &[(&public_key.z, u_i), (&public_key.s, &r_i)],
            &public_key.n,
            Some(&mut bn_ctx),
        )?);
        r.push(r_i);
    }

    let r_delta = bn_rand(system.l_n)?;
    let t_delta = BigNumber::multi_mod_exp(
        &[(&public_key.z, &delta), (&public_key.s, &r_delta)],
        &public_key.n,
        Some(&mut bn_ctx),
    )?;

    let mut alpha = r_delta.clone();
    for (u_i, r_i) in u.iter().zip(r.iter()) {
        alpha = alpha.sub(&u_i.mul(r_i, Some(&mut bn_ctx))?)?;
    }
    r.push(r_delta);

    let u_tilde = (0..4)
        .map(|_| bn_rand(system.l_m_tilde()))
        .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;
    let r_tilde = (0..5)
        .map(|_| bn_rand(system.l_r_tilde()))
        .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;
    let alpha_tilde = bn_rand(system.l_alpha_tilde())?;

    let mut t_values = Vec::with_capacity(6);
    for (u_tilde_i, r_tilde_i) in u_tilde.iter().zip(r_tilde.iter()) {
        t_values.push(BigNumber::multi_mod_exp(
            &[(&public_key.z, u_tilde_i), (&public_key.s, r_tilde_i)],
            &public_key.n,
            Some(&mut bn_ctx),
        )?);
    }

    let r_delta_tilde = if positive {
        r_tilde[4].clone()
    } else {
        r_tilde[4].set_negative(true)?
    };
    t_values.push(BigNumber::multi_mod_exp(
        &[(&public_key.z, m_tilde), (&public_key.s, &r_delta_tilde)],
        &public_key.n,
        Some(&mut bn_ctx),
    )?);

    let mut pairs: Vec<(&BigNumber, &BigNumber)> = t.iter().zip(u_tilde.iter()).collect();
    pairs.push((&public_key.s, &alpha_tilde));
    t_values.push(BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut bn_ctx))?);

    let mut common_values = t.clone();
    common_values.push(t_delta.clone());

    let commitments = Commitments {
        t_values,
        common_values,
    };
    let state = InequalityProverState {
        t,
        t_delta,
        u,
        r,
        alpha,
        u_tilde,
        r_tilde,
        alpha_tilde,
    };

    trace!("InequalityPredicate::init: <<< commitments: {:?}", commitments);

    Ok((commitments, state))
}

/// `m_hat` is the identifier's shared response.
pub(crate) fn finalize(
    state: InequalityProverState,
    c: &BigNumber,
    m_hat: &BigNumber,
) -> UrsaCryptoResult<InequalityProof> {
    let mut u_hat = state
        .u_tilde
        .iter()
        .zip(state.u.iter())
        .map(|(tilde, u)| response(tilde, c, u))
        .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;
    u_hat.push(m_hat.clone());

    let r_hat = state
        .r_tilde
        .iter()
        .zip(state.r.iter())
        .map(|(tilde, r)| response(tilde, c, r))
        .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?;

    Ok(InequalityProof {
        t: state.t,
        t_delta: state.t_delta,
        u_hat,
        r_hat,
        alpha_hat: response(&state.alpha_tilde, c, &state.alpha)?,
    })
}

/// Recomputes `t̂_0..t̂_3`, `t̂_Δ` and `t̂_Q`.
pub(crate) fn verify(
    predicate: &InequalityPredicate,
    proof: &InequalityProof,
    ctx: &VerifierContext,
) -> UrsaCryptoResult<Commitments> {
    trace!("InequalityPredicate::verify: >>> proof: {:?}", proof);

    if proof.t.len() != 4 || proof.u_hat.len() != 5 || proof.r_hat.len() != 5 {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            "Inequality proof has a wrong number of values",
        ));
    }

    let m_hat = match ctx.response(&predicate.identifier)? {
        IdentifierResponse::Hidden(m_hat) => m_hat,
        IdentifierResponse::Revealed(_) => {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Identifier {} must be hidden", predicate.identifier),
            ))
        }
    };
    if proof.u_hat[4] != *m_hat {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            "Inequality response is not linked to its identifier",
        ));
    }
    if proof.r_hat.iter().any(BigNumber::is_negative) {
        return Err(err_msg(
            UrsaCryptoErrorKind::ProofRejected,
            "Inequality randomness response is negative",
        ));
    }

    let public_key = &predicate.public_key;
    let (delta_prime, positive) = predicate.operator.delta_prime(&predicate.boundary)?;
    let mut bn_ctx = BigNumber::new_context()?;

    let mut t_values = Vec::with_capacity(6);
    for i in 0..4 {
        t_values.push(BigNumber::multi_mod_exp(
            &[
                (&proof.t[i], &ctx.minus_c),
                (&public_key.z, &proof.u_hat[i]),
                (&public_key.s, &proof.r_hat[i]),
            ],
            &public_key.n,
            Some(&mut bn_ctx),
        )?);
    }

    let a = if positive {
        BigNumber::from_u32(1)?
    } else {
        BigNumber::from_u32(1)?.set_negative(true)?
    };
    let a_r_delta_hat = if positive {
        proof.r_hat[4].clone()
    } else {
        proof.r_hat[4].set_negative(true)?
    };
    let base = BigNumber::multi_mod_exp(
        &[(&proof.t_delta, &a), (&public_key.z, &delta_prime)],
        &public_key.n,
        Some(&mut bn_ctx),
    )?;
    t_values.push(BigNumber::multi_mod_exp(
        &[
            (&base, &ctx.minus_c),
            (&public_key.z, m_hat),
            (&public_key.s, &a_r_delta_hat),
        ],
        &public_key.n,
        Some(&mut bn_ctx),
    )?);

    let mut pairs = vec![(&proof.t_delta, &ctx.minus_c)];
    pairs.extend(proof.t.iter().zip(proof.u_hat.iter().take(4)));
    pairs.push((&public_key.s, &proof.alpha_hat));
    t_values.push(BigNumber::multi_mod_exp(&pairs, &public_key.n, Some(&mut bn_ctx))?);

    let mut common_values = proof.t.clone();
    common_values.push(proof.t_delta.clone());

    trace!("InequalityPredicate::verify: <<< t_values: {:?}", t_values);

    Ok(Commitments {
        t_values,
        common_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cl::issuer::mocks::*;
    use crate::cl::predicates::IdentifierSecret;
    use crate::cl::MasterSecret;

    use std::collections::BTreeMap;

    fn predicate(operator: InequalityOperator, boundary: usize) -> InequalityPredicate {
        InequalityPredicate {
            identifier: "age".to_string(),
            operator,
            boundary: BigNumber::from_u32(boundary).unwrap(),
            public_key: ISSUER_KEY_PAIR.public_key.clone(),
        }
    }

    #[test]
    fn delta_prime_follows_operator() {
        let boundary = BigNumber::from_u32(18).unwrap();
        let cases = [
            (InequalityOperator::Leq, 18, false),
            (InequalityOperator::Lt, 17, false),
            (InequalityOperator::Geq, 18, true),
            (InequalityOperator::Gt, 19, true),
        ];
        for (operator, expected, positive) in cases.iter() {
            let (delta_prime, sign) = operator.delta_prime(&boundary).unwrap();
            assert_eq!(BigNumber::from_u32(*expected).unwrap(), delta_prime);
            assert_eq!(*positive, sign);
        }
    }

    #[test]
    fn delta_respects_boundaries() {
        let m = BigNumber::from_u32(18).unwrap();
        assert!(delta(&predicate(InequalityOperator::Geq, 18), &m).unwrap().is_zero());
        assert!(delta(&predicate(InequalityOperator::Leq, 18), &m).unwrap().is_zero());
        assert_eq!(
            UrsaCryptoErrorKind::StatementUnsatisfiable,
            delta(&predicate(InequalityOperator::Gt, 18), &m).unwrap_err().kind()
        );
        assert_eq!(
            UrsaCryptoErrorKind::StatementUnsatisfiable,
            delta(&predicate(InequalityOperator::Lt, 18), &m).unwrap_err().kind()
        );
        assert_eq!(
            BigNumber::from_u32(1).unwrap(),
            delta(&predicate(InequalityOperator::Lt, 20), &m).unwrap()
        );
    }

    #[test]
    fn t_values_are_recomputed_from_responses() {
        let system = &GROUP_PARAMETERS.system;
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let age = BigNumber::from_u32(28).unwrap();
        let age_tilde = bn_rand(system.l_m_tilde()).unwrap();

        for operator in &[
            InequalityOperator::Lt,
            InequalityOperator::Leq,
            InequalityOperator::Gt,
            InequalityOperator::Geq,
        ] {
            let boundary = match operator {
                InequalityOperator::Lt | InequalityOperator::Leq => 30,
                InequalityOperator::Gt | InequalityOperator::Geq => 20,
            };
            let predicate = predicate(*operator, boundary);

            let mut identifiers = BTreeMap::new();
            identifiers.insert(
                "age".to_string(),
                IdentifierSecret {
                    value: age.clone(),
                    tilde: Some(age_tilde.clone()),
                },
            );
            let prover_ctx = ProverContext {
                group: &GROUP_PARAMETERS,
                master_secret: &master_secret,
                ms_tilde: bn_rand(system.l_m_tilde()).unwrap(),
                identifiers,
            };

            let (commitments, state) = init(&predicate, &prover_ctx).unwrap();
            let c = bn_rand(system.l_h).unwrap();
            let m_hat = response(&age_tilde, &c, &age).unwrap();
            let proof = finalize(state, &c, &m_hat).unwrap();

            let mut m_hats = BTreeMap::new();
            m_hats.insert("age".to_string(), m_hat);
            let revealed_values = BTreeMap::new();
            let verifier_ctx = VerifierContext {
                group: &GROUP_PARAMETERS,
                challenge: &c,
                minus_c: c.set_negative(true).unwrap(),
                ms_hat: None,
                m_hats: &m_hats,
                revealed_values: &revealed_values,
            };

            assert_eq!(commitments, verify(&predicate, &proof, &verifier_ctx).unwrap());
        }
    }

    #[test]
    fn verify_rejects_unlinked_response() {
        let system = &GROUP_PARAMETERS.system;
        let master_secret = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        let age = BigNumber::from_u32(28).unwrap();
        let age_tilde = bn_rand(system.l_m_tilde()).unwrap();
        let predicate = predicate(InequalityOperator::Geq, 18);

        let mut identifiers = BTreeMap::new();
        identifiers.insert(
            "age".to_string(),
            IdentifierSecret {
                value: age.clone(),
                tilde: Some(age_tilde.clone()),
            },
        );
        let prover_ctx = ProverContext {
            group: &GROUP_PARAMETERS,
            master_secret: &master_secret,
            ms_tilde: bn_rand(system.l_m_tilde()).unwrap(),
            identifiers,
        };

        let (_, state) = init(&predicate, &prover_ctx).unwrap();
        let c = bn_rand(system.l_h).unwrap();
        let m_hat = response(&age_tilde, &c, &age).unwrap();
        let proof = finalize(state, &c, &m_hat).unwrap();

        let mut m_hats = BTreeMap::new();
        m_hats.insert("age".to_string(), m_hat.increment().unwrap());
        let revealed_values = BTreeMap::new();
        let verifier_ctx = VerifierContext {
            group: &GROUP_PARAMETERS,
            challenge: &c,
            minus_c: c.set_negative(true).unwrap(),
            ms_hat: None,
            m_hats: &m_hats,
            revealed_values: &revealed_values,
        };

        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            verify(&predicate, &proof, &verifier_ctx).unwrap_err().kind()
        );

        let mut linked = BTreeMap::new();
        linked.insert("age".to_string(), m_hat);
        let verifier_ctx = VerifierContext {
            m_hats: &linked,
            ..verifier_ctx
        };
        assert!(verify(&predicate, &proof, &verifier_ctx).is_ok());

        let mut negated = proof.clone();
        negated.r_hat[4] = negated.r_hat[4].set_negative(true).unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::ProofRejected,
            verify(&predicate, &negated, &verifier_ctx).unwrap_err().kind()
        );
    }
}
