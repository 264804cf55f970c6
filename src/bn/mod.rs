use crate::errors::prelude::*;

use glass_pumpkin::{prime, safe_prime};
use num_bigint::{BigInt, BigUint, RandBigInt, Sign, ToBigInt};
use num_integer::{Integer, Roots};
use num_traits::identities::{One, Zero};
use num_traits::{Num, Pow, Signed, ToPrimitive};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use serde::de::{Deserialize, Deserializer, Error as DError, Visitor};
use serde::ser::{Serialize, Serializer};

use std::cmp::Ord;
use std::cmp::Ordering;
use std::fmt;

pub struct BigNumberContext;

#[derive(Clone)]
pub struct BigNumber {
    bn: BigInt,
}

macro_rules! prime_generation {
    ($f:ident, $size:ident, $msg:expr) => {
        match $f::new($size) {
            Ok(prime) => match prime.to_bigint() {
                Some(bn) => Ok(BigNumber { bn }),
                None => Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, $msg)),
            },
            Err(err) => Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("{}: {:?}", $msg, err),
            )),
        }
    };
}

impl BigNumber {
    pub fn new_context() -> UrsaCryptoResult<BigNumberContext> {
        Ok(BigNumberContext {})
    }

    pub fn new() -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: BigInt::zero() })
    }

    pub fn generate_prime(size: usize) -> UrsaCryptoResult<BigNumber> {
        prime_generation!(prime, size, "Unable to generate prime")
    }

    pub fn generate_safe_prime(size: usize) -> UrsaCryptoResult<BigNumber> {
        prime_generation!(safe_prime, size, "Unable to generate safe prime")
    }

    /// Random odd prime in `[start, end)`.
    pub fn generate_prime_in_range(start: &BigNumber, end: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        let start = BigNumber::_to_biguint(start, "start")?;
        let end = BigNumber::_to_biguint(end, "end")?;

        if end <= start {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Empty range for prime generation",
            ));
        }

        let mut rng = OsRng;
        let mut iteration = 0;
        loop {
            let mut candidate = rng.gen_biguint_range(&start, &end);
            if candidate.is_even() {
                candidate += 1u32;
            }
            if candidate < end && prime::check(&candidate) {
                debug!("Found prime in {} iteration", iteration);
                return Ok(BigNumber {
                    bn: BigInt::from_biguint(Sign::Plus, candidate),
                });
            }
            iteration += 1;
        }
    }

    pub fn is_prime(&self, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<bool> {
        match self.bn.to_biguint() {
            Some(ref bn) if !self.is_negative() => Ok(prime::check(bn)),
            _ => Ok(false),
        }
    }

    /// Uniformly random non-negative integer of at most `size` bits.
    pub fn rand(size: usize) -> UrsaCryptoResult<BigNumber> {
        let mut rng = OsRng;
        let res = rng.gen_biguint(size as u64);
        Ok(BigNumber {
            bn: BigInt::from_biguint(Sign::Plus, res),
        })
    }

    /// Uniformly random integer in `[0, self)`.
    pub fn rand_range(&self) -> UrsaCryptoResult<BigNumber> {
        if !self.bn.is_positive() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "rand_range upper bound must be positive",
            ));
        }
        let mut rng = OsRng;
        Ok(BigNumber {
            bn: rng.gen_bigint_range(&BigInt::zero(), &self.bn),
        })
    }

    pub fn num_bits(&self) -> UrsaCryptoResult<usize> {
        Ok(self.bn.bits() as usize)
    }

    pub fn is_bit_set(&self, n: usize) -> UrsaCryptoResult<bool> {
        let res = self.bn.magnitude() >> n;
        Ok(res.is_odd())
    }

    pub fn set_bit(&mut self, n: usize) -> UrsaCryptoResult<&mut BigNumber> {
        if !self.is_bit_set(n)? {
            let mask = BigInt::one() << n;
            if self.is_negative() {
                self.bn -= mask;
            } else {
                self.bn += mask;
            }
        }
        Ok(self)
    }

    pub fn is_odd(&self) -> bool {
        self.bn.is_odd()
    }

    pub fn is_zero(&self) -> bool {
        self.bn.is_zero()
    }

    pub fn from_u32(n: usize) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: BigInt::from(n) })
    }

    pub fn from_u64(n: u64) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: BigInt::from(n) })
    }

    pub fn from_dec(dec: &str) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber {
            bn: BigInt::from_str_radix(dec, 10)?,
        })
    }

    pub fn from_hex(hex: &str) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber {
            bn: BigInt::from_str_radix(hex, 16)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber {
            bn: BigInt::from_bytes_be(Sign::Plus, bytes),
        })
    }

    pub fn to_dec(&self) -> UrsaCryptoResult<String> {
        Ok(self.bn.to_str_radix(10))
    }

    pub fn to_hex(&self) -> UrsaCryptoResult<String> {
        Ok(self.bn.to_str_radix(16).to_uppercase())
    }

    /// Big-endian magnitude. Sign is dropped; hashed values are always reduced first.
    pub fn to_bytes(&self) -> UrsaCryptoResult<Vec<u8>> {
        let (_, res) = self.bn.to_bytes_be();
        Ok(res)
    }

    pub fn to_u64(&self) -> UrsaCryptoResult<u64> {
        self.bn.to_u64().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("{} does not fit in u64", self.bn),
            )
        })
    }

    pub fn add(&self, a: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn + &a.bn })
    }

    pub fn sub(&self, a: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn - &a.bn })
    }

    pub fn sqr(&self, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn * &self.bn })
    }

    pub fn mul(&self, a: &BigNumber, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn * &a.bn })
    }

    pub fn mod_mul(
        &self,
        a: &BigNumber,
        n: &BigNumber,
        _ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        BigNumber::_check_modulus(n)?;
        Ok(BigNumber {
            bn: (&self.bn * &a.bn).mod_floor(&n.bn),
        })
    }

    pub fn mod_sub(
        &self,
        a: &BigNumber,
        n: &BigNumber,
        _ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        BigNumber::_check_modulus(n)?;
        Ok(BigNumber {
            bn: (&self.bn - &a.bn).mod_floor(&n.bn),
        })
    }

    pub fn div(&self, a: &BigNumber, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        if a.bn.is_zero() {
            return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, "Division by zero"));
        }
        Ok(BigNumber { bn: &self.bn / &a.bn })
    }

    pub fn add_word(&mut self, w: u32) -> UrsaCryptoResult<&mut BigNumber> {
        self.bn += w;
        Ok(self)
    }

    /// `self^a mod b`. A negative exponent inverts the base first.
    pub fn mod_exp(
        &self,
        a: &BigNumber,
        b: &BigNumber,
        ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        BigNumber::_check_modulus(b)?;
        if a.is_negative() {
            let base = self.inverse(b, ctx)?;
            Ok(BigNumber {
                bn: base.bn.modpow(&(-&a.bn), &b.bn),
            })
        } else {
            Ok(BigNumber {
                bn: self.bn.mod_floor(&b.bn).modpow(&a.bn, &b.bn),
            })
        }
    }

    /// Computes `∏ base_i^exp_i mod modulus` with a single square-and-multiply pass
    /// over the longest exponent. Negative exponents invert their base.
    pub fn multi_mod_exp(
        pairs: &[(&BigNumber, &BigNumber)],
        modulus: &BigNumber,
        mut ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        BigNumber::_check_modulus(modulus)?;

        let mut bases = Vec::with_capacity(pairs.len());
        let mut exp_bits = Vec::with_capacity(pairs.len());
        for (base, exp) in pairs {
            let base = if exp.is_negative() {
                base.inverse(modulus, ctx.as_deref_mut())?.bn
            } else {
                base.bn.mod_floor(&modulus.bn)
            };
            bases.push(base);
            exp_bits.push(exp.bn.magnitude().to_radix_le(2));
        }

        let max_bits = exp_bits.iter().map(Vec::len).max().unwrap_or(0);
        let mut acc = BigInt::one().mod_floor(&modulus.bn);

        for i in (0..max_bits).rev() {
            acc = (&acc * &acc).mod_floor(&modulus.bn);
            for (base, bits) in bases.iter().zip(exp_bits.iter()) {
                if bits.get(i).map_or(false, |bit| *bit == 1) {
                    acc = (&acc * base).mod_floor(&modulus.bn);
                }
            }
        }

        Ok(BigNumber { bn: acc })
    }

    /// Non-negative remainder of `self` modulo `a`.
    pub fn modulus(&self, a: &BigNumber, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        BigNumber::_check_modulus(a)?;
        Ok(BigNumber {
            bn: self.bn.mod_floor(&a.bn),
        })
    }

    pub fn exp(&self, a: &BigNumber, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        if self.bn.bits() == 0 {
            return Ok(BigNumber::default());
        } else if a.bn.is_one() {
            return Ok(self.clone());
        }

        match a.bn.to_u64() {
            Some(num) => Ok(BigNumber {
                bn: Pow::pow(&self.bn, num),
            }),
            None => Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "'a' cannot be held in u64",
            )),
        }
    }

    /// `2^exp`
    pub fn power_of_two(exp: usize) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber {
            bn: BigInt::one() << exp,
        })
    }

    pub fn inverse(&self, n: &BigNumber, _ctx: Option<&mut BigNumberContext>) -> UrsaCryptoResult<BigNumber> {
        if n.bn.is_one() || n.bn.is_zero() {
            return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, "Invalid modulus"));
        }

        // Extended Euclid; the Bezout coefficient of `n` is not needed.
        let (mut t, mut new_t) = (BigInt::zero(), BigInt::one());
        let (mut r, mut new_r) = (n.bn.clone(), self.bn.mod_floor(&n.bn));

        while !new_r.is_zero() {
            let quotient = &r / &new_r;

            let next_t = &t - &quotient * &new_t;
            t = std::mem::replace(&mut new_t, next_t);

            let next_r = &r - &quotient * &new_r;
            r = std::mem::replace(&mut new_r, next_r);
        }

        if r > BigInt::one() {
            return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, "Not invertible"));
        }

        Ok(BigNumber {
            bn: t.mod_floor(&n.bn),
        })
    }

    pub fn gcd(&self, other: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber {
            bn: self.bn.gcd(&other.bn),
        })
    }

    /// Truncated square root of a non-negative number.
    pub fn sqrt(&self) -> UrsaCryptoResult<BigNumber> {
        if self.is_negative() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Square root of a negative number",
            ));
        }
        Ok(BigNumber {
            bn: Roots::sqrt(&self.bn),
        })
    }

    pub fn set_negative(&self, negative: bool) -> UrsaCryptoResult<BigNumber> {
        match (self.bn < BigInt::zero(), negative) {
            (true, true) | (false, false) => Ok(self.clone()),
            (true, false) | (false, true) => Ok(BigNumber { bn: -&self.bn }),
        }
    }

    pub fn is_negative(&self) -> bool {
        self.bn.is_negative()
    }

    pub fn increment(&self) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn + 1 })
    }

    pub fn decrement(&self) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn - 1 })
    }

    pub fn lshift1(&self) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn << 1 })
    }

    pub fn rshift1(&self) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn >> 1 })
    }

    pub fn rshift(&self, n: usize) -> UrsaCryptoResult<BigNumber> {
        Ok(BigNumber { bn: &self.bn >> n })
    }

    pub fn mod_div(
        &self,
        b: &BigNumber,
        p: &BigNumber,
        ctx: Option<&mut BigNumberContext>,
    ) -> UrsaCryptoResult<BigNumber> {
        // a * (1/b mod p) mod p
        let res = (&self.bn * b.inverse(p, ctx)?.bn).mod_floor(&p.bn);
        Ok(BigNumber { bn: res })
    }

    pub fn random_qr(n: &BigNumber) -> UrsaCryptoResult<BigNumber> {
        n.rand_range()?.sqr(None)?.modulus(n, None)
    }

    pub fn hash_array(nums: &[Vec<u8>]) -> UrsaCryptoResult<Vec<u8>> {
        let mut hasher = Sha256::new();

        for num in nums.iter() {
            hasher.update(num);
        }

        Ok(hasher.finalize().to_vec())
    }

    fn _check_modulus(n: &BigNumber) -> UrsaCryptoResult<()> {
        if n.bn.is_positive() {
            Ok(())
        } else {
            Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Modulus must be positive",
            ))
        }
    }

    fn _to_biguint(bn: &BigNumber, name: &str) -> UrsaCryptoResult<BigUint> {
        bn.bn.to_biguint().ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Invalid number for '{}': {:?}", name, bn),
            )
        })
    }
}

impl fmt::Debug for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BigNumber {{ bn: {} }}", self.bn.to_str_radix(10))
    }
}

impl fmt::Display for BigNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.bn.to_str_radix(10))
    }
}

impl Ord for BigNumber {
    fn cmp(&self, other: &BigNumber) -> Ordering {
        self.bn.cmp(&other.bn)
    }
}

impl Eq for BigNumber {}

impl PartialOrd for BigNumber {
    fn partial_cmp(&self, other: &BigNumber) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for BigNumber {
    fn eq(&self, other: &BigNumber) -> bool {
        self.bn == other.bn
    }
}

impl Zeroize for BigNumber {
    fn zeroize(&mut self) {
        self.bn = BigInt::zero();
    }
}

impl Serialize for BigNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_newtype_struct("BigNumber", &self.bn.to_str_radix(10))
    }
}

impl<'a> Deserialize<'a> for BigNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        struct BigNumberVisitor;

        impl<'a> Visitor<'a> for BigNumberVisitor {
            type Value = BigNumber;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("expected BigNumber")
            }

            fn visit_str<E>(self, value: &str) -> Result<BigNumber, E>
            where
                E: DError,
            {
                BigNumber::from_dec(value).map_err(DError::custom)
            }
        }

        deserializer.deserialize_str(BigNumberVisitor)
    }
}

impl Default for BigNumber {
    fn default() -> BigNumber {
        BigNumber { bn: BigInt::zero() }
    }
}

// Constants that are used throughout the code, so avoiding recomputation.
lazy_static! {
    pub static ref BIGNUMBER_1: BigNumber = BigNumber { bn: BigInt::one() };
    pub static ref BIGNUMBER_2: BigNumber = BigNumber {
        bn: BigInt::from(2u32)
    };
}
