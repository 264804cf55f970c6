use super::constants::FOUR_SQUARES_BRUTE_FORCE_LIMIT;
use super::hash::get_hash_as_int;
use super::params::GroupParameters;
use super::IssuerPublicKey;
use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::cmp::min;

pub fn bn_rand(size: usize) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::bn_rand: >>> size:: {:?}", size);

    let res = BigNumber::rand(size)?;

    trace!("Helpers::bn_rand: <<< res: {:?}", secret!(&res));

    Ok(res)
}

pub fn bn_rand_range(bn: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::bn_rand_range: >>> bn:: {:?}", bn);

    let res = bn.rand_range()?;

    trace!("Helpers::bn_rand_range: <<< res: {:?}", secret!(&res));

    Ok(res)
}

/// Random `l_v` bit integer with its top bit set.
pub fn generate_v_prime_prime(l_v: usize) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::generate_v_prime_prime: >>> l_v: {:?}", l_v);

    let mut v_prime_prime = bn_rand(l_v)?;
    v_prime_prime.set_bit(l_v - 1)?;

    trace!(
        "Helpers::generate_v_prime_prime: <<< v_prime_prime: {:?}",
        secret!(&v_prime_prime)
    );

    Ok(v_prime_prime)
}

pub fn generate_prime(size: usize) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::generate_prime: >>> size: {:?}", size);

    let prime = BigNumber::generate_prime(size)?;

    trace!("Helpers::generate_prime: <<< prime: {:?}", prime);

    Ok(prime)
}

pub fn generate_prime_in_range(start: &BigNumber, end: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    trace!(
        "Helpers::generate_prime_in_range: >>> start: {:?}, end: {:?}",
        secret!(start),
        secret!(end)
    );

    let prime = BigNumber::generate_prime_in_range(start, end)?;

    trace!(
        "Helpers::generate_prime_in_range: <<< prime: {:?}",
        secret!(&prime)
    );

    Ok(prime)
}

pub fn generate_safe_prime(size: usize) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::generate_safe_prime: >>> size: {:?}", size);

    let safe_prime = BigNumber::generate_safe_prime(size)?;

    trace!(
        "Helpers::generate_safe_prime: <<< safe_prime: {:?}",
        secret!(&safe_prime)
    );

    Ok(safe_prime)
}

/// Random exponent in `[2, p'q' - 2]`.
pub fn gen_x(p: &BigNumber, q: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::gen_x: >>> p: {:?}, q: {:?}", secret!(p), secret!(q));

    let mut x = p.mul(q, None)?.sub(&BigNumber::from_u32(3)?)?.rand_range()?;
    x.add_word(2)?;

    trace!("Helpers::gen_x: <<< x: {:?}", secret!(&x));

    Ok(x)
}

pub fn random_qr(n: &BigNumber) -> UrsaCryptoResult<BigNumber> {
    trace!("Helpers::random_qr: >>> n: {:?}", n);

    let qr = BigNumber::random_qr(n)?;

    trace!("Helpers::random_qr: <<< qr: {:?}", qr);

    Ok(qr)
}

/// True when `|value|` fits in `max_bits` bits.
pub fn check_bit_length(value: &BigNumber, max_bits: usize) -> UrsaCryptoResult<bool> {
    Ok(value.num_bits()? <= max_bits)
}

/// Proof context: hash of the group parameters and every distinct issuer key in order.
pub fn calc_proof_context(group: &GroupParameters, public_keys: &[&IssuerPublicKey]) -> UrsaCryptoResult<BigNumber> {
    trace!(
        "Helpers::calc_proof_context: >>> group: {:?}, public_keys: {:?}",
        group,
        public_keys
    );

    let mut values = group.to_hashable()?;
    let mut seen: Vec<&BigNumber> = Vec::new();

    for public_key in public_keys {
        if seen.contains(&&public_key.n) {
            continue;
        }
        seen.push(&public_key.n);
        values.extend(public_key.key_hashable()?);
    }

    let context = get_hash_as_int(&values)?;

    trace!("Helpers::calc_proof_context: <<< context: {:?}", context);

    Ok(context)
}

/// Lagrange decomposition `delta = u0² + u1² + u2² + u3²`.
///
/// Powers of four are factored out first. The odd part is searched exhaustively when small;
/// otherwise random `x, y` are drawn until `delta - x² - y²` is a prime `p ≡ 1 (mod 4)`,
/// which is split into two squares from a square root of -1 modulo `p`.
pub fn four_squares(delta: &BigNumber) -> UrsaCryptoResult<[BigNumber; 4]> {
    trace!("Helpers::four_squares: >>> delta: {:?}", secret!(delta));

    if delta.is_negative() {
        return Err(err_msg(
            UrsaCryptoErrorKind::StatementUnsatisfiable,
            "Negative integers are not sums of squares",
        ));
    }

    let four = BigNumber::from_u32(4)?;
    let mut n = delta.clone();
    let mut k = 0;
    while !n.is_zero() && n.modulus(&four, None)?.is_zero() {
        n = n.rshift(2)?;
        k += 1;
    }

    let roots = if n < BigNumber::from_u64(FOUR_SQUARES_BRUTE_FORCE_LIMIT)? {
        _small_four_squares(n.to_u64()?)
            .ok_or_else(|| err_msg(UrsaCryptoErrorKind::InvalidState, "Exhaustive search failed"))?
            .iter()
            .map(|u| BigNumber::from_u64(*u))
            .collect::<UrsaCryptoResult<Vec<BigNumber>>>()?
    } else {
        _large_four_squares(&n)?.to_vec()
    };

    let scale = BigNumber::power_of_two(k)?;
    let mut res: [BigNumber; 4] = Default::default();
    let mut sum = BigNumber::new()?;
    for (i, root) in roots.iter().enumerate() {
        res[i] = root.mul(&scale, None)?;
        sum = sum.add(&res[i].sqr(None)?)?;
    }

    if sum != *delta {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidState,
            "Four squares decomposition does not add up",
        ));
    }

    trace!("Helpers::four_squares: <<< res: {:?}", secret!(&res));

    Ok(res)
}

fn _isqrt_u64(v: u64) -> u64 {
    let mut r = (v as f64).sqrt() as u64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

fn _small_four_squares(n: u64) -> Option<[u64; 4]> {
    for a in (0..=_isqrt_u64(n)).rev() {
        let r1 = n - a * a;
        for b in (0..=min(a, _isqrt_u64(r1))).rev() {
            let r2 = r1 - b * b;
            for c in (0..=min(b, _isqrt_u64(r2))).rev() {
                let r3 = r2 - c * c;
                let d = _isqrt_u64(r3);
                if d * d == r3 {
                    return Some([a, b, c, d]);
                }
            }
        }
    }
    None
}

// n is not divisible by 4
fn _large_four_squares(n: &BigNumber) -> UrsaCryptoResult<[BigNumber; 4]> {
    let four = BigNumber::from_u32(4)?;
    let (x_odd, y_odd) = match n.modulus(&four, None)?.to_u64()? {
        1 => (false, false),
        2 => (true, false),
        3 => (true, true),
        _ => {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Powers of four must be factored out",
            ))
        }
    };

    // x² + y² ≤ n keeps p non-negative
    let bound = n.rshift1()?.sqrt()?;

    let mut iteration = 0;
    loop {
        iteration += 1;

        let x = _with_parity(bn_rand_range(&bound)?, x_odd)?;
        let y = _with_parity(bn_rand_range(&bound)?, y_odd)?;
        let p = n.sub(&x.sqr(None)?)?.sub(&y.sqr(None)?)?;

        if !p.is_prime(None)? || p.modulus(&four, None)?.to_u64()? != 1 {
            continue;
        }

        if let Some((a, b)) = _prime_as_two_squares(&p)? {
            debug!("Helpers::four_squares: prime found in {} iterations", iteration);
            return Ok([x, y, a, b]);
        }
    }
}

fn _with_parity(value: BigNumber, odd: bool) -> UrsaCryptoResult<BigNumber> {
    if value.is_odd() == odd {
        Ok(value)
    } else {
        value.increment()
    }
}

// Hermite-Serret: Euclid on (p, t) with t² ≡ -1 stops at the first remainder below √p.
fn _prime_as_two_squares(p: &BigNumber) -> UrsaCryptoResult<Option<(BigNumber, BigNumber)>> {
    let p_minus_one = p.decrement()?;
    let exp = p_minus_one.rshift(2)?;
    let two = BigNumber::from_u32(2)?;

    let t = loop {
        let c = bn_rand_range(p)?;
        if c < two {
            continue;
        }
        let t = c.mod_exp(&exp, p, None)?;
        if t.sqr(None)?.modulus(p, None)? == p_minus_one {
            break t;
        }
    };

    let limit = p.sqrt()?;
    let mut a = p.clone();
    let mut b = t;
    while b > limit {
        let r = a.modulus(&b, None)?;
        a = b;
        b = r;
    }

    let rest = p.sub(&b.sqr(None)?)?;
    let c = rest.sqrt()?;

    if c.sqr(None)? == rest {
        Ok(Some((b, c)))
    } else {
        Ok(None)
    }
}
