use super::constants::*;
use super::hash::get_hash_as_int;
use super::helpers::*;
use crate::bn::{BigNumber, BIGNUMBER_1};
use crate::errors::prelude::*;

use std::cmp::max;

/// Bit-lengths every protocol step draws its sizes from.
///
/// Values are fixed once a deployment is set up. The default is the production
/// profile; `with_modulus_length` derives a consistent profile for another modulus size.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemParameters {
    /// Modulus length.
    pub l_n: usize,
    /// Attribute value length.
    pub l_m: usize,
    /// Signature exponent length.
    pub l_e: usize,
    /// Length of the interval the signature exponent is picked from.
    pub l_e_prime: usize,
    /// Hash and nonce length.
    pub l_h: usize,
    /// Statistical zero-knowledge margin.
    pub l_phi: usize,
    /// Signature randomizer length.
    pub l_v: usize,
    /// Prime certainty.
    pub l_r: usize,
    /// Commitment group modulus length.
    pub l_gamma: usize,
    /// Commitment group order length.
    pub l_rho: usize,
    /// Prime test rounds.
    pub l_pt: usize,
}

impl Default for SystemParameters {
    fn default() -> SystemParameters {
        SystemParameters {
            l_n: LARGE_MODULUS,
            l_m: LARGE_MESSAGE,
            l_e: LARGE_E,
            l_e_prime: LARGE_E_PRIME,
            l_h: LARGE_HASH,
            l_phi: LARGE_STAT_ZK,
            l_v: LARGE_V,
            l_r: LARGE_PRIME_CERTAINTY,
            l_gamma: LARGE_GAMMA,
            l_rho: LARGE_RHO,
            l_pt: LARGE_PT,
        }
    }
}

impl SystemParameters {
    /// Production profile with another modulus length and `l_v` derived from it.
    pub fn with_modulus_length(l_n: usize) -> SystemParameters {
        let mut params = SystemParameters {
            l_n,
            ..SystemParameters::default()
        };
        params.l_v = l_n + 2 * params.l_phi + params.l_h + params.margin();
        params
    }

    fn margin(&self) -> usize {
        max(self.l_m + 4, self.l_e_prime + 2)
    }

    pub fn validate(&self) -> UrsaCryptoResult<()> {
        trace!("SystemParameters::validate: >>> params: {:?}", self);

        let checks = [
            (self.l_h == LARGE_HASH, "l_h must match the 256 bit digest length"),
            (
                self.l_e > self.l_phi + self.l_h + self.margin(),
                "l_e too small for the statistical margin",
            ),
            (
                self.l_v >= self.l_n + self.l_phi + self.l_h + self.margin(),
                "l_v too small to hide the master secret",
            ),
            (self.l_gamma > self.l_rho, "l_gamma must exceed l_rho"),
            (self.l_n % 2 == 0 && self.l_n >= 256, "l_n must be even and at least 256"),
        ];

        for (ok, msg) in checks.iter() {
            if !ok {
                return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, *msg));
            }
        }

        trace!("SystemParameters::validate: <<<");

        Ok(())
    }

    pub fn l_v_prime(&self) -> usize {
        self.l_v + self.l_phi + self.l_h + 1
    }

    pub fn l_m_tilde(&self) -> usize {
        self.l_m + self.l_phi + self.l_h + 1
    }

    pub fn l_e_tilde(&self) -> usize {
        self.l_e_prime + self.l_phi + self.l_h
    }

    pub fn l_v_prime_tilde(&self) -> usize {
        self.l_v_prime() + self.l_phi + self.l_h
    }

    pub fn l_v_tilde(&self) -> usize {
        self.l_v_prime() + self.l_phi + self.l_h + 2
    }

    pub fn l_r_a(&self) -> usize {
        self.l_n + self.l_phi
    }

    pub fn l_r_tilde(&self) -> usize {
        self.l_n + 2 * self.l_phi + self.l_h
    }

    pub fn l_alpha_tilde(&self) -> usize {
        self.l_n + self.l_m + 2 * self.l_phi + self.l_h + 3
    }

    pub fn l_nonce(&self) -> usize {
        self.l_h
    }
}

/// Prime order subgroup of `Z*_Γ` used for pseudonyms and domain pseudonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParameters {
    pub system: SystemParameters,
    pub capital_gamma: BigNumber,
    pub rho: BigNumber,
    pub g: BigNumber,
    pub h: BigNumber,
}

impl GroupParameters {
    /// Generates Γ = bρ + 1 and two generators of the order ρ subgroup.
    pub fn new(system: &SystemParameters) -> UrsaCryptoResult<GroupParameters> {
        trace!("GroupParameters::new: >>> system: {:?}", system);

        system.validate()?;

        let rho = generate_prime(system.l_rho)?;
        let cofactor_bits = system.l_gamma - system.l_rho;

        let mut iteration = 0;
        let (capital_gamma, cofactor) = loop {
            // b even and of cofactor_bits bits, so Γ = bρ + 1 is odd
            let mut b = bn_rand(cofactor_bits - 1)?.lshift1()?;
            b.set_bit(cofactor_bits - 1)?;

            let mut candidate = rho.mul(&b, None)?;
            candidate.add_word(1)?;

            if candidate.num_bits()? == system.l_gamma && candidate.is_prime(None)? {
                break (candidate, b);
            }
            iteration += 1;
        };
        debug!("GroupParameters::new: Γ found in {} iterations", iteration);

        let g = GroupParameters::_subgroup_generator(&capital_gamma, &cofactor)?;
        let h = GroupParameters::_subgroup_generator(&capital_gamma, &cofactor)?;

        let group = GroupParameters {
            system: *system,
            capital_gamma,
            rho,
            g,
            h,
        };

        trace!("GroupParameters::new: <<< group: {:?}", group);

        Ok(group)
    }

    fn _subgroup_generator(capital_gamma: &BigNumber, cofactor: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        loop {
            let x = bn_rand_range(capital_gamma)?;
            if x.is_zero() {
                continue;
            }
            let g = x.mod_exp(cofactor, capital_gamma, None)?;
            if g != *BIGNUMBER_1 {
                return Ok(g);
            }
        }
    }

    /// Checks primality of Γ and ρ, ρ | Γ - 1, and that g and h have order ρ.
    pub fn verify(&self) -> UrsaCryptoResult<bool> {
        trace!("GroupParameters::verify: >>> group: {:?}", self);

        self.system.validate()?;

        let gamma_minus_one = self.capital_gamma.decrement()?;

        let valid = self.capital_gamma.is_prime(None)?
            && self.rho.is_prime(None)?
            && gamma_minus_one.modulus(&self.rho, None)?.is_zero()
            && self._has_order_rho(&self.g)?
            && self._has_order_rho(&self.h)?;

        trace!("GroupParameters::verify: <<< valid: {:?}", valid);

        Ok(valid)
    }

    fn _has_order_rho(&self, element: &BigNumber) -> UrsaCryptoResult<bool> {
        Ok(*element != *BIGNUMBER_1
            && element.mod_exp(&self.rho, &self.capital_gamma, None)? == *BIGNUMBER_1)
    }

    /// Byte encodings of Γ, ρ, g, h in hashing order.
    pub fn to_hashable(&self) -> UrsaCryptoResult<Vec<Vec<u8>>> {
        Ok(vec![
            self.capital_gamma.to_bytes()?,
            self.rho.to_bytes()?,
            self.g.to_bytes()?,
            self.h.to_bytes()?,
        ])
    }

    /// Hash identifying these parameters. Master secrets are bound to it.
    pub fn context(&self) -> UrsaCryptoResult<BigNumber> {
        get_hash_as_int(&self.to_hashable()?)
    }
}
