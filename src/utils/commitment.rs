use crate::bn::{BigNumber, BigNumberContext};
use crate::errors::prelude::*;

/// Generate a pedersen commitment to a given number
///
/// # Arguments
/// * `gen_1` - first generator
/// * `m` - exponent of the first generator
/// * `gen_2` - second generator
/// * `r` - exponent of the second generator
/// * `modulus` - all computations are done this modulo
/// * `ctx` - big number context
///
/// # Result
/// Return the pedersen commitment, i.e `(gen_1^m)*(gen_2^r)`
pub fn get_pedersen_commitment(
    gen_1: &BigNumber,
    m: &BigNumber,
    gen_2: &BigNumber,
    r: &BigNumber,
    modulus: &BigNumber,
    ctx: &mut BigNumberContext,
) -> UrsaCryptoResult<BigNumber> {
    BigNumber::multi_mod_exp(&[(gen_1, m), (gen_2, r)], modulus, Some(ctx))
}

/// Commitment to several messages at once: `∏ bases[i]^messages[i] * blinding_base^r`.
pub fn get_vector_commitment(
    bases: &[BigNumber],
    messages: &[BigNumber],
    blinding_base: &BigNumber,
    r: &BigNumber,
    modulus: &BigNumber,
    ctx: &mut BigNumberContext,
) -> UrsaCryptoResult<BigNumber> {
    if bases.len() != messages.len() {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidStructure,
            format!(
                "{} messages for {} commitment bases",
                messages.len(),
                bases.len()
            ),
        ));
    }

    let mut pairs: Vec<(&BigNumber, &BigNumber)> = bases.iter().zip(messages.iter()).collect();
    pairs.push((blinding_base, r));

    BigNumber::multi_mod_exp(&pairs, modulus, Some(ctx))
}
