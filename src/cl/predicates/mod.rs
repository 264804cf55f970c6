//! One module per statement type. Each contributes t-values and common values
//! from fresh randomizers (`init`), responses once the challenge is fixed
//! (`finalize`), and recomputed t-values on the verifier side (`verify`).
pub mod cl;
pub mod commitment;
pub mod inequality;
pub mod pseudonym;
pub mod representation;
pub mod verifiable_encryption;

use crate::bn::BigNumber;
use crate::cl::{GroupParameters, MasterSecret, SystemParameters};
use crate::errors::prelude::*;

use std::collections::BTreeMap;

/// Values a predicate feeds into the challenge.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Commitments {
    pub t_values: Vec<BigNumber>,
    pub common_values: Vec<BigNumber>,
}

/// Secret value of an identifier and, when hidden, its shared randomizer.
#[derive(Debug)]
pub(crate) struct IdentifierSecret {
    pub value: BigNumber,
    pub tilde: Option<BigNumber>,
}

pub(crate) struct ProverContext<'a> {
    pub group: &'a GroupParameters,
    pub master_secret: &'a MasterSecret,
    pub ms_tilde: BigNumber,
    pub identifiers: BTreeMap<String, IdentifierSecret>,
}

impl<'a> ProverContext<'a> {
    pub fn system(&self) -> &SystemParameters {
        &self.group.system
    }

    pub fn identifier(&self, name: &str) -> UrsaCryptoResult<&IdentifierSecret> {
        self.identifiers.get(name).ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("No value for identifier {}", name),
            )
        })
    }

    /// Value and randomizer of an identifier the statement requires to stay hidden.
    pub fn hidden(&self, name: &str) -> UrsaCryptoResult<(&BigNumber, &BigNumber)> {
        let identifier = self.identifier(name)?;
        match identifier.tilde {
            Some(ref tilde) => Ok((&identifier.value, tilde)),
            None => Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Identifier {} must be hidden", name),
            )),
        }
    }
}

pub(crate) enum IdentifierResponse<'a> {
    Hidden(&'a BigNumber),
    Revealed(&'a BigNumber),
}

pub(crate) struct VerifierContext<'a> {
    pub group: &'a GroupParameters,
    pub challenge: &'a BigNumber,
    pub minus_c: BigNumber,
    pub ms_hat: Option<&'a BigNumber>,
    pub m_hats: &'a BTreeMap<String, BigNumber>,
    pub revealed_values: &'a BTreeMap<String, BigNumber>,
}

impl<'a> VerifierContext<'a> {
    pub fn system(&self) -> &SystemParameters {
        &self.group.system
    }

    pub fn ms_hat(&self) -> UrsaCryptoResult<&'a BigNumber> {
        self.ms_hat.ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Proof carries no master secret response",
            )
        })
    }

    pub fn response(&self, name: &str) -> UrsaCryptoResult<IdentifierResponse<'a>> {
        if let Some(m_hat) = self.m_hats.get(name) {
            return Ok(IdentifierResponse::Hidden(m_hat));
        }
        if let Some(value) = self.revealed_values.get(name) {
            return Ok(IdentifierResponse::Revealed(value));
        }
        Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!("Proof has no response for identifier {}", name),
        ))
    }

    pub fn hidden_response(&self, name: &str) -> UrsaCryptoResult<&'a BigNumber> {
        match self.response(name)? {
            IdentifierResponse::Hidden(m_hat) => Ok(m_hat),
            IdentifierResponse::Revealed(_) => Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Identifier {} must be hidden", name),
            )),
        }
    }
}

/// `tilde + c * secret`
pub(crate) fn response(tilde: &BigNumber, c: &BigNumber, secret: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    c.mul(secret, None)?.add(tilde)
}

/// `(value / ∏ revealed)^-c * ∏ hidden` over `modulus`.
///
/// `revealed` pairs are divided out of `value`, `hidden` pairs carry responses.
pub(crate) fn reconstruct_t_value(
    value: &BigNumber,
    revealed: &[(&BigNumber, &BigNumber)],
    hidden: &[(&BigNumber, &BigNumber)],
    minus_c: &BigNumber,
    modulus: &BigNumber,
) -> UrsaCryptoResult<BigNumber> {
    let mut ctx = BigNumber::new_context()?;

    let denominator = BigNumber::multi_mod_exp(revealed, modulus, Some(&mut ctx))?;
    let base = value.mod_div(&denominator, modulus, Some(&mut ctx))?;

    let mut pairs = vec![(&base, minus_c)];
    pairs.extend_from_slice(hidden);

    BigNumber::multi_mod_exp(&pairs, modulus, Some(&mut ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconstruct_t_value_matches_commitment() {
        let modulus = BigNumber::from_u32(1_000_003).unwrap();
        let g = BigNumber::from_u32(5).unwrap();
        let h = BigNumber::from_u32(7).unwrap();
        let m_revealed = BigNumber::from_u32(11).unwrap();
        let m_hidden = BigNumber::from_u32(13).unwrap();
        let tilde = BigNumber::from_u32(1234).unwrap();
        let c = BigNumber::from_u32(99).unwrap();

        let value = BigNumber::multi_mod_exp(&[(&g, &m_revealed), (&h, &m_hidden)], &modulus, None).unwrap();
        let t = h.mod_exp(&tilde, &modulus, None).unwrap();

        let m_hat = response(&tilde, &c, &m_hidden).unwrap();
        let minus_c = c.set_negative(true).unwrap();
        let t_hat = reconstruct_t_value(&value, &[(&g, &m_revealed)], &[(&h, &m_hat)], &minus_c, &modulus).unwrap();

        assert_eq!(t, t_hat);
    }
}
