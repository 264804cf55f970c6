use crate::bn::BigNumber;
use crate::errors::prelude::*;

use std::collections::BTreeMap;

pub fn get_hash_as_int(nums: &[Vec<u8>]) -> UrsaCryptoResult<BigNumber> {
    trace!("Hash::get_hash_as_int: >>> nums: {:?}", nums);

    let hash = BigNumber::from_bytes(&BigNumber::hash_array(nums)?);

    trace!("Hash::get_hash_as_int: <<< hash: {:?}", hash);

    hash
}

/// Collects the inputs of a Fiat–Shamir challenge and hashes them in a fixed order:
/// t-values, then common values, then context, nonce and the named messages sorted by name.
///
/// Values are added in predicate order by prover and verifier alike.
#[derive(Debug, Default)]
pub struct ChallengeBuilder {
    t_values: Vec<Vec<u8>>,
    common_values: Vec<Vec<u8>>,
}

impl ChallengeBuilder {
    pub fn new() -> ChallengeBuilder {
        ChallengeBuilder::default()
    }

    pub fn add_t_value(&mut self, value: &BigNumber) -> UrsaCryptoResult<()> {
        self.t_values.push(value.to_bytes()?);
        Ok(())
    }

    pub fn add_t_values(&mut self, values: &[BigNumber]) -> UrsaCryptoResult<()> {
        for value in values {
            self.add_t_value(value)?;
        }
        Ok(())
    }

    pub fn add_common_value(&mut self, value: &BigNumber) -> UrsaCryptoResult<()> {
        self.common_values.push(value.to_bytes()?);
        Ok(())
    }

    pub fn add_common_values(&mut self, values: &[BigNumber]) -> UrsaCryptoResult<()> {
        for value in values {
            self.add_common_value(value)?;
        }
        Ok(())
    }

    pub fn finalize(
        self,
        context: &BigNumber,
        nonce: &BigNumber,
        messages: &BTreeMap<String, String>,
    ) -> UrsaCryptoResult<BigNumber> {
        let mut values = self.t_values;
        values.extend(self.common_values);
        values.push(context.to_bytes()?);
        values.push(nonce.to_bytes()?);
        for (name, text) in messages {
            values.push(name.as_bytes().to_vec());
            values.push(text.as_bytes().to_vec());
        }

        get_hash_as_int(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_hash_as_int_works() {
        let nums = vec![
            BigNumber::from_hex("ff9d2eedfee9cffd9ef6dbffedff3fcbef4caecb9bffe79bfa94d3fdf6abfbff")
                .unwrap()
                .to_bytes()
                .unwrap(),
            BigNumber::from_hex("ff9d2eedfee9cffd9ef6dbffedff3fcbef4caecb9bffe79bfa9168615ccbc546")
                .unwrap()
                .to_bytes()
                .unwrap(),
        ];
        let res = get_hash_as_int(&nums);

        assert!(res.is_ok());
        assert_eq!(
            "2C2566C22E04AB3F18B3BA693823175002F10F400811363D26BBB33633AC8BAD",
            res.unwrap().to_hex().unwrap()
        );
    }

    #[test]
    fn challenge_puts_t_values_before_common_values() {
        let a = BigNumber::from_u32(11).unwrap();
        let b = BigNumber::from_u32(22).unwrap();
        let context = BigNumber::from_u32(33).unwrap();
        let nonce = BigNumber::from_u32(44).unwrap();
        let messages = BTreeMap::new();

        let mut builder = ChallengeBuilder::new();
        builder.add_common_value(&b).unwrap();
        builder.add_t_value(&a).unwrap();
        let challenge = builder.finalize(&context, &nonce, &messages).unwrap();

        let expected = get_hash_as_int(&[
            a.to_bytes().unwrap(),
            b.to_bytes().unwrap(),
            context.to_bytes().unwrap(),
            nonce.to_bytes().unwrap(),
        ])
        .unwrap();
        assert_eq!(expected, challenge);
    }

    #[test]
    fn challenge_binds_messages_and_nonce() {
        let t = BigNumber::from_u32(5).unwrap();
        let context = BigNumber::from_u32(6).unwrap();
        let nonce = BigNumber::from_u32(7).unwrap();
        let other_nonce = BigNumber::from_u32(8).unwrap();

        let mut messages = BTreeMap::new();
        messages.insert("purpose".to_string(), "login".to_string());

        let challenge = |nonce: &BigNumber, messages: &BTreeMap<String, String>| {
            let mut builder = ChallengeBuilder::new();
            builder.add_t_value(&t).unwrap();
            builder.finalize(&context, nonce, messages).unwrap()
        };

        let base = challenge(&nonce, &messages);
        assert_eq!(base, challenge(&nonce, &messages));
        assert_ne!(base, challenge(&other_nonce, &messages));
        assert_ne!(base, challenge(&nonce, &BTreeMap::new()));
    }
}
