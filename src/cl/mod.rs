pub mod constants;
pub mod hash;
pub mod helpers;
pub mod params;

pub mod encryption;
pub mod issuer;
pub mod predicates;
pub mod proof;
pub mod prover;
pub mod recipient;
pub mod verifier;

pub use self::params::{GroupParameters, SystemParameters};

use self::hash::get_hash_as_int;
use crate::bn::{BigNumber, BIGNUMBER_2};
use crate::errors::prelude::*;
use crate::utils::commitment::get_vector_commitment;

use zeroize::Zeroize;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

pub type Nonce = BigNumber;

/// Creates random nonce of `l_h` bits.
///
/// # Example
/// ```
/// use ursa_idmx::cl::{new_nonce, SystemParameters};
///
/// let _nonce = new_nonce(&SystemParameters::default()).unwrap();
/// ```
pub fn new_nonce(system: &SystemParameters) -> UrsaCryptoResult<Nonce> {
    helpers::bn_rand(system.l_nonce())
}

/// Issuer public key: modulus `n`, bases `S`, `Z` and `R[0..=k]`.
///
/// `R[0]` is reserved for the holder's master secret, attribute `i` of a structure uses `R[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerPublicKey {
    pub group: GroupParameters,
    pub n: BigNumber,
    pub s: BigNumber,
    pub z: BigNumber,
    pub r: Vec<BigNumber>,
    pub epoch_length: Option<u64>,
}

impl IssuerPublicKey {
    /// Number of attributes a credential under this key may carry.
    pub fn attribute_capacity(&self) -> usize {
        self.r.len().saturating_sub(1)
    }

    /// Rejects keys that lack the master secret base or a usable modulus.
    pub fn validate(&self) -> UrsaCryptoResult<()> {
        if self.r.is_empty() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Issuer key has no master secret base",
            ));
        }
        if self.n <= *BIGNUMBER_2 {
            return Err(err_msg(UrsaCryptoErrorKind::InvalidStructure, "Issuer modulus is too small"));
        }
        Ok(())
    }

    /// Base `R[index]`, `R[0]` being the master secret base.
    pub(crate) fn base(&self, index: usize) -> UrsaCryptoResult<&BigNumber> {
        self.r.get(index).ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Issuer key has no base R[{}]", index),
            )
        })
    }

    pub(crate) fn key_hashable(&self) -> UrsaCryptoResult<Vec<Vec<u8>>> {
        let mut values = vec![self.n.to_bytes()?, self.s.to_bytes()?, self.z.to_bytes()?];
        for r in self.r.iter() {
            values.push(r.to_bytes()?);
        }
        Ok(values)
    }

    /// Hash of the group parameters and this key. Bound into every issuance challenge.
    pub fn context(&self) -> UrsaCryptoResult<BigNumber> {
        let mut values = self.group.to_hashable()?;
        values.extend(self.key_hashable()?);
        get_hash_as_int(&values)
    }

    /// Commitment key with `count` message bases `[Z, R[1], ..., R[count - 1]]`.
    pub fn commitment_key(&self, count: usize) -> UrsaCryptoResult<CommitmentKey> {
        if count == 0 || count > self.r.len() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Commitment key of {} bases not supported by issuer key", count),
            ));
        }

        let mut bases = vec![self.z.clone()];
        bases.extend(self.r[1..count].iter().cloned());

        Ok(CommitmentKey {
            n: self.n.clone(),
            s: self.s.clone(),
            bases,
        })
    }

    pub fn compute_epoch(&self, unix_time: u64) -> UrsaCryptoResult<u64> {
        match self.epoch_length {
            Some(length) if length > 0 => Ok(unix_time / length),
            _ => Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Issuer key has no epoch length",
            )),
        }
    }

    pub fn current_epoch(&self) -> UrsaCryptoResult<u64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| err_msg(UrsaCryptoErrorKind::InvalidState, format!("Clock error: {}", err)))?;
        self.compute_epoch(now.as_secs())
    }
}

/// Safe prime factors `p = 2p' + 1`, `q = 2q' + 1` of the issuer modulus, kept as `p'` and `q'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerPrivateKey {
    pub p_prime: BigNumber,
    pub q_prime: BigNumber,
}

impl IssuerPrivateKey {
    /// Order `p'q'` of the quadratic residues mod `n`.
    pub fn order(&self) -> UrsaCryptoResult<BigNumber> {
        self.p_prime.mul(&self.q_prime, None)
    }
}

impl Drop for IssuerPrivateKey {
    fn drop(&mut self) {
        self.p_prime.zeroize();
        self.q_prime.zeroize();
    }
}

/// Proof that `Z` and every `R[i]` lie in the group generated by `S`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCorrectnessProof {
    pub c: BigNumber,
    pub xz_cap: BigNumber,
    pub xr_cap: Vec<BigNumber>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuerKeyPair {
    pub public_key: IssuerPublicKey,
    pub private_key: IssuerPrivateKey,
    pub correctness_proof: KeyCorrectnessProof,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Value known to the issuer.
    Known,
    /// Value known only to the recipient.
    Hidden,
    /// Recipient hands the issuer a commitment to the value.
    Committed,
}

/// Data type an attribute value is encoded from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Int,
    /// Days or seconds since the epoch.
    Date,
    /// Hash of the text.
    String,
    /// Prime encoding of a choice.
    Enum,
}

impl AttributeType {
    /// Whether the encoding preserves order, so that range statements are meaningful.
    pub fn is_numeric(self) -> bool {
        match self {
            AttributeType::Int | AttributeType::Date => true,
            AttributeType::String | AttributeType::Enum => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStructure {
    pub name: String,
    pub kind: AttributeKind,
    pub data_type: AttributeType,
}

/// Attributes whose values an issuer may change after issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSpecification {
    attributes: BTreeSet<String>,
}

impl UpdateSpecification {
    pub fn new(attributes: &[&str]) -> UpdateSpecification {
        UpdateSpecification {
            attributes: attributes.iter().map(|name| (*name).to_owned()).collect(),
        }
    }

    pub fn attributes(&self) -> &BTreeSet<String> {
        &self.attributes
    }

    /// False if any of `values` names an attribute that is not updatable.
    pub fn verify_values(&self, values: &Values) -> bool {
        values.names().all(|name| self.attributes.contains(name))
    }
}

/// Ordered attribute layout of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStructure {
    attributes: Vec<AttributeStructure>,
    update_specification: Option<UpdateSpecification>,
    epoch_attribute: Option<String>,
}

impl CredentialStructure {
    pub fn attributes(&self) -> &[AttributeStructure] {
        &self.attributes
    }

    /// Attribute with `name` and the index of its base in `R`.
    pub fn attribute(&self, name: &str) -> Option<(usize, &AttributeStructure)> {
        self.attributes
            .iter()
            .enumerate()
            .find(|(_, attr)| attr.name == name)
            .map(|(i, attr)| (i + 1, attr))
    }

    pub fn update_specification(&self) -> Option<&UpdateSpecification> {
        self.update_specification.as_ref()
    }

    pub fn epoch_attribute(&self) -> Option<&str> {
        self.epoch_attribute.as_deref()
    }
}

/// A Builder of `CredentialStructure`.
#[derive(Debug)]
pub struct CredentialStructureBuilder {
    attributes: Vec<AttributeStructure>,
    update_specification: Option<UpdateSpecification>,
    epoch_attribute: Option<String>,
}

impl CredentialStructureBuilder {
    pub fn new() -> UrsaCryptoResult<CredentialStructureBuilder> {
        Ok(CredentialStructureBuilder {
            attributes: Vec::new(),
            update_specification: None,
            epoch_attribute: None,
        })
    }

    pub fn add_attribute(&mut self, name: &str, kind: AttributeKind, data_type: AttributeType) -> UrsaCryptoResult<()> {
        if self.attributes.iter().any(|attr| attr.name == name) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Duplicate attribute {}", name),
            ));
        }
        self.attributes.push(AttributeStructure {
            name: name.to_owned(),
            kind,
            data_type,
        });
        Ok(())
    }

    pub fn set_update_specification(&mut self, spec: UpdateSpecification) -> UrsaCryptoResult<()> {
        self.update_specification = Some(spec);
        Ok(())
    }

    pub fn set_epoch_attribute(&mut self, name: &str) -> UrsaCryptoResult<()> {
        self.epoch_attribute = Some(name.to_owned());
        Ok(())
    }

    pub fn finalize(self) -> UrsaCryptoResult<CredentialStructure> {
        let kind_of = |name: &str| {
            self.attributes
                .iter()
                .find(|attr| attr.name == name)
                .map(|attr| attr.kind)
        };

        if let Some(ref update) = self.update_specification {
            for name in update.attributes() {
                if kind_of(name.as_str()) != Some(AttributeKind::Known) {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Updatable attribute {} must be a known attribute", name),
                    ));
                }
            }
        }

        if let Some(ref name) = self.epoch_attribute {
            let updatable = self
                .update_specification
                .as_ref()
                .map_or(false, |update| update.attributes().contains(name));
            if kind_of(name.as_str()) != Some(AttributeKind::Known) || !updatable {
                return Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Epoch attribute {} must be known and updatable", name),
                ));
            }
        }

        Ok(CredentialStructure {
            attributes: self.attributes,
            update_specification: self.update_specification,
            epoch_attribute: self.epoch_attribute,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Integer(BigNumber),
    /// Issuer side of a committed attribute.
    Commitment(BigNumber),
    /// Recipient side of a committed attribute.
    Opening(CommitmentOpening),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ValuesRole {
    Issuer,
    Recipient,
}

/// Encoded attribute values by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Values {
    values: BTreeMap<String, AttributeValue>,
}

impl Values {
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn integer(&self, name: &str) -> Option<&BigNumber> {
        match self.values.get(name) {
            Some(AttributeValue::Integer(value)) => Some(value),
            _ => None,
        }
    }

    /// Plain integer values. Fails if any value is a commitment or opening.
    pub fn integers(&self) -> UrsaCryptoResult<BTreeMap<String, BigNumber>> {
        self.values
            .iter()
            .map(|(name, value)| match value {
                AttributeValue::Integer(value) => Ok((name.clone(), value.clone())),
                _ => Err(err_msg(
                    UrsaCryptoErrorKind::InvalidStructure,
                    format!("Attribute {} is not a plain integer", name),
                )),
            })
            .collect()
    }

    /// Checks these values fit `structure` for the given protocol role.
    ///
    /// Every name must exist in the structure. A recipient holds every value, committed
    /// ones as an opening. An issuer holds known values and commitments to committed ones.
    pub fn check_against(
        &self,
        structure: &CredentialStructure,
        role: ValuesRole,
        system: &SystemParameters,
    ) -> UrsaCryptoResult<()> {
        trace!(
            "Values::check_against: >>> structure: {:?}, role: {:?}",
            structure,
            role
        );

        if let Some(name) = self.names().find(|name| structure.attribute(name).is_none()) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Value for unknown attribute {}", name),
            ));
        }

        for attr in structure.attributes() {
            let value = self.values.get(&attr.name);
            match (role, attr.kind, value) {
                (_, AttributeKind::Known, Some(AttributeValue::Integer(value)))
                | (ValuesRole::Recipient, AttributeKind::Hidden, Some(AttributeValue::Integer(value))) => {
                    Values::_check_value(&attr.name, value, system)?
                }
                (ValuesRole::Issuer, AttributeKind::Hidden, None)
                | (ValuesRole::Issuer, AttributeKind::Committed, Some(AttributeValue::Commitment(_))) => {}
                (ValuesRole::Recipient, AttributeKind::Committed, Some(AttributeValue::Opening(opening))) => {
                    match opening.messages() {
                        [value] => Values::_check_value(&attr.name, value, system)?,
                        _ => {
                            return Err(err_msg(
                                UrsaCryptoErrorKind::InvalidStructure,
                                format!("Opening of {} must hold exactly one message", attr.name),
                            ))
                        }
                    }
                }
                (_, _, None) => {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Missing value for attribute {}", attr.name),
                    ))
                }
                (_, _, Some(_)) => {
                    return Err(err_msg(
                        UrsaCryptoErrorKind::InvalidStructure,
                        format!("Value of {} does not match its kind {:?}", attr.name, attr.kind),
                    ))
                }
            }
        }

        trace!("Values::check_against: <<<");

        Ok(())
    }

    fn _check_value(name: &str, value: &BigNumber, system: &SystemParameters) -> UrsaCryptoResult<()> {
        if value.is_negative() || value.num_bits()? > system.l_m {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Value of {} is outside [0, 2^{})", name, system.l_m),
            ));
        }
        Ok(())
    }
}

/// A Builder of `Values`.
#[derive(Debug)]
pub struct ValuesBuilder {
    values: BTreeMap<String, AttributeValue>,
}

impl ValuesBuilder {
    pub fn new() -> UrsaCryptoResult<ValuesBuilder> {
        Ok(ValuesBuilder {
            values: BTreeMap::new(),
        })
    }

    pub fn add_integer(&mut self, name: &str, value: BigNumber) -> UrsaCryptoResult<()> {
        self._add(name, AttributeValue::Integer(value))
    }

    pub fn add_dec(&mut self, name: &str, dec: &str) -> UrsaCryptoResult<()> {
        self._add(name, AttributeValue::Integer(BigNumber::from_dec(dec)?))
    }

    pub fn add_commitment_opening(&mut self, name: &str, opening: CommitmentOpening) -> UrsaCryptoResult<()> {
        self._add(name, AttributeValue::Opening(opening))
    }

    pub fn add_commitment(&mut self, name: &str, commitment: BigNumber) -> UrsaCryptoResult<()> {
        self._add(name, AttributeValue::Commitment(commitment))
    }

    fn _add(&mut self, name: &str, value: AttributeValue) -> UrsaCryptoResult<()> {
        if self.values.contains_key(name) {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Duplicate value for {}", name),
            ));
        }
        self.values.insert(name.to_owned(), value);
        Ok(())
    }

    pub fn finalize(self) -> UrsaCryptoResult<Values> {
        Ok(Values { values: self.values })
    }
}

/// The holder's long-term secret, bound to one set of group parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterSecret {
    value: BigNumber,
    group_context: BigNumber,
}

impl MasterSecret {
    pub fn new(group: &GroupParameters) -> UrsaCryptoResult<MasterSecret> {
        trace!("MasterSecret::new: >>>");

        let master_secret = MasterSecret {
            value: helpers::bn_rand(group.system.l_m)?,
            group_context: group.context()?,
        };

        trace!("MasterSecret::new: <<< master_secret: {:?}", secret!(&master_secret));

        Ok(master_secret)
    }

    pub fn value(&self) -> &BigNumber {
        &self.value
    }

    pub(crate) fn check_group(&self, group: &GroupParameters) -> UrsaCryptoResult<()> {
        if self.group_context != group.context()? {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Master secret belongs to other group parameters",
            ));
        }
        Ok(())
    }
}

impl Drop for MasterSecret {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Bases of a multi-message commitment `C = ∏ bases[j]^m_j * S^r mod n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentKey {
    pub n: BigNumber,
    pub s: BigNumber,
    pub bases: Vec<BigNumber>,
}

impl CommitmentKey {
    /// Commits to `messages` with fresh randomness of the modulus length.
    pub fn commit(&self, messages: &[BigNumber]) -> UrsaCryptoResult<CommitmentOpening> {
        trace!("CommitmentKey::commit: >>> messages: {:?}", secret!(messages));

        let mut ctx = BigNumber::new_context()?;
        let randomness = helpers::bn_rand(self.n.num_bits()?)?;
        let commitment = get_vector_commitment(&self.bases, messages, &self.s, &randomness, &self.n, &mut ctx)?;

        let opening = CommitmentOpening {
            messages: messages.to_vec(),
            randomness,
            commitment,
            key: self.clone(),
        };

        trace!("CommitmentKey::commit: <<< commitment: {:?}", opening.commitment);

        Ok(opening)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentOpening {
    messages: Vec<BigNumber>,
    randomness: BigNumber,
    commitment: BigNumber,
    key: CommitmentKey,
}

impl CommitmentOpening {
    pub fn messages(&self) -> &[BigNumber] {
        &self.messages
    }

    pub fn randomness(&self) -> &BigNumber {
        &self.randomness
    }

    pub fn commitment(&self) -> &BigNumber {
        &self.commitment
    }

    pub fn key(&self) -> &CommitmentKey {
        &self.key
    }

    pub fn verify(&self) -> UrsaCryptoResult<bool> {
        let mut ctx = BigNumber::new_context()?;
        let commitment = get_vector_commitment(
            &self.key.bases,
            &self.messages,
            &self.key.s,
            &self.randomness,
            &self.key.n,
            &mut ctx,
        )?;
        Ok(commitment == self.commitment)
    }
}

/// Public value with a secret multi-base representation `value = ∏ bases[i]^x_i mod modulus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representation {
    pub value: BigNumber,
    pub bases: Vec<BigNumber>,
    pub modulus: BigNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationOpening {
    pub exponents: Vec<BigNumber>,
}

impl Representation {
    pub fn new(
        bases: &[BigNumber],
        exponents: &[BigNumber],
        modulus: &BigNumber,
    ) -> UrsaCryptoResult<(Representation, RepresentationOpening)> {
        if bases.len() != exponents.len() || bases.is_empty() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("{} exponents for {} bases", exponents.len(), bases.len()),
            ));
        }

        let opening = RepresentationOpening {
            exponents: exponents.to_vec(),
        };
        let representation = Representation {
            value: BigNumber::new()?,
            bases: bases.to_vec(),
            modulus: modulus.clone(),
        };
        let value = representation.evaluate(&opening)?;

        Ok((Representation { value, ..representation }, opening))
    }

    fn evaluate(&self, opening: &RepresentationOpening) -> UrsaCryptoResult<BigNumber> {
        if self.bases.len() != opening.exponents.len() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                "Representation opening has a wrong number of exponents",
            ));
        }
        let pairs: Vec<(&BigNumber, &BigNumber)> = self.bases.iter().zip(opening.exponents.iter()).collect();
        BigNumber::multi_mod_exp(&pairs, &self.modulus, None)
    }

    pub fn verify_opening(&self, opening: &RepresentationOpening) -> UrsaCryptoResult<bool> {
        Ok(self.evaluate(opening)? == self.value)
    }
}

/// CL signature `(A, e, v)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSignature {
    pub a: BigNumber,
    pub e: BigNumber,
    pub v: BigNumber,
}

/// Holder state needed to accept re-signed credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUpdateState {
    pub v_prime: BigNumber,
    pub u: BigNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    signature: CredentialSignature,
    values: BTreeMap<String, BigNumber>,
    structure: CredentialStructure,
    public_key: IssuerPublicKey,
    update_state: Option<CredentialUpdateState>,
}

impl Credential {
    pub fn signature(&self) -> &CredentialSignature {
        &self.signature
    }

    pub fn values(&self) -> &BTreeMap<String, BigNumber> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&BigNumber> {
        self.values.get(name)
    }

    pub fn structure(&self) -> &CredentialStructure {
        &self.structure
    }

    pub fn public_key(&self) -> &IssuerPublicKey {
        &self.public_key
    }

    pub fn update_state(&self) -> Option<&CredentialUpdateState> {
        self.update_state.as_ref()
    }

    /// Checks `Z ≡ A^e * S^v * R[0]^ms * ∏ R[i]^m_i (mod n)`.
    pub fn verify_signature(&self, master_secret: &MasterSecret) -> UrsaCryptoResult<bool> {
        trace!("Credential::verify_signature: >>> signature: {:?}", self.signature);

        let valid = check_cl_signature(
            &self.public_key,
            &self.structure,
            &self.signature,
            &self.values,
            master_secret,
        )?;

        trace!("Credential::verify_signature: <<< valid: {:?}", valid);

        Ok(valid)
    }
}

pub(crate) fn check_cl_signature(
    public_key: &IssuerPublicKey,
    structure: &CredentialStructure,
    signature: &CredentialSignature,
    values: &BTreeMap<String, BigNumber>,
    master_secret: &MasterSecret,
) -> UrsaCryptoResult<bool> {
    let mut pairs: Vec<(&BigNumber, &BigNumber)> = vec![
        (&signature.a, &signature.e),
        (&public_key.s, &signature.v),
        (public_key.base(0)?, &master_secret.value),
    ];
    pairs.extend(attribute_bases(public_key, structure, values, |_| true)?);

    let z = BigNumber::multi_mod_exp(&pairs, &public_key.n, None)?;

    Ok(z == public_key.z)
}

/// `(R[i], m_i)` pairs for every attribute of `structure` accepted by `filter`.
pub(crate) fn attribute_bases<'a, F>(
    public_key: &'a IssuerPublicKey,
    structure: &CredentialStructure,
    values: &'a BTreeMap<String, BigNumber>,
    filter: F,
) -> UrsaCryptoResult<Vec<(&'a BigNumber, &'a BigNumber)>>
where
    F: Fn(&AttributeStructure) -> bool,
{
    let mut pairs = Vec::new();
    for (i, attr) in structure.attributes().iter().enumerate() {
        if !filter(attr) {
            continue;
        }
        let base = public_key.base(i + 1)?;
        let value = values.get(&attr.name).ok_or_else(|| {
            err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!("Missing value for attribute {}", attr.name),
            )
        })?;
        pairs.push((base, value));
    }
    Ok(pairs)
}

/// Public part of an issuance: the issuer key, the structure, and their context hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceSpec {
    public_key: IssuerPublicKey,
    structure: CredentialStructure,
    context: BigNumber,
}

impl IssuanceSpec {
    pub fn new(public_key: &IssuerPublicKey, structure: &CredentialStructure) -> UrsaCryptoResult<IssuanceSpec> {
        trace!("IssuanceSpec::new: >>> structure: {:?}", structure);

        public_key.validate()?;
        if structure.attributes().len() > public_key.attribute_capacity() {
            return Err(err_msg(
                UrsaCryptoErrorKind::InvalidStructure,
                format!(
                    "Structure has {} attributes, issuer key supports {}",
                    structure.attributes().len(),
                    public_key.attribute_capacity()
                ),
            ));
        }

        let spec = IssuanceSpec {
            public_key: public_key.clone(),
            structure: structure.clone(),
            context: public_key.context()?,
        };

        trace!("IssuanceSpec::new: <<< context: {:?}", spec.context);

        Ok(spec)
    }

    pub fn public_key(&self) -> &IssuerPublicKey {
        &self.public_key
    }

    pub fn structure(&self) -> &CredentialStructure {
        &self.structure
    }

    pub fn context(&self) -> &BigNumber {
        &self.context
    }
}

/// Progress of one issuance session on either side.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuanceState {
    Init,
    Round1Sent,
    Round2Sent,
    Done,
    Failed,
}

pub(crate) fn check_state(actual: IssuanceState, expected: IssuanceState, operation: &str) -> UrsaCryptoResult<()> {
    if actual != expected {
        return Err(err_msg(
            UrsaCryptoErrorKind::InvalidState,
            format!("{} called in state {:?}, expected {:?}", operation, actual, expected),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::issuer::mocks::*;
    use super::*;

    #[test]
    fn structure_builder_rejects_duplicates() {
        let mut builder = CredentialStructureBuilder::new().unwrap();
        builder.add_attribute("name", AttributeKind::Known, AttributeType::String).unwrap();
        let err = builder.add_attribute("name", AttributeKind::Hidden, AttributeType::String).unwrap_err();
        assert_eq!(UrsaCryptoErrorKind::InvalidStructure, err.kind());
    }

    #[test]
    fn structure_builder_rejects_hidden_updatable_attribute() {
        let mut builder = CredentialStructureBuilder::new().unwrap();
        builder.add_attribute("name", AttributeKind::Hidden, AttributeType::String).unwrap();
        builder
            .set_update_specification(UpdateSpecification::new(&["name"]))
            .unwrap();
        assert!(builder.finalize().is_err());
    }

    #[test]
    fn structure_builder_checks_epoch_attribute() {
        let mut builder = CredentialStructureBuilder::new().unwrap();
        builder.add_attribute("epoch", AttributeKind::Known, AttributeType::Date).unwrap();
        builder.set_epoch_attribute("epoch").unwrap();
        assert!(builder.finalize().is_err());

        let mut builder = CredentialStructureBuilder::new().unwrap();
        builder.add_attribute("epoch", AttributeKind::Known, AttributeType::Date).unwrap();
        builder
            .set_update_specification(UpdateSpecification::new(&["epoch"]))
            .unwrap();
        builder.set_epoch_attribute("epoch").unwrap();
        let structure = builder.finalize().unwrap();
        assert_eq!(Some("epoch"), structure.epoch_attribute());
        assert_eq!(Some((1, &structure.attributes()[0])), structure.attribute("epoch"));
    }

    #[test]
    fn values_check_against_works() {
        let system = &GROUP_PARAMETERS.system;
        let structure = credential_structure();
        let key_pair = &*ISSUER_KEY_PAIR;

        let recipient_values = recipient_values(&key_pair.public_key);
        recipient_values
            .check_against(&structure, ValuesRole::Recipient, system)
            .unwrap();

        let issuer_values = issuer_values(&recipient_values);
        issuer_values
            .check_against(&structure, ValuesRole::Issuer, system)
            .unwrap();

        // the issuer must not hold hidden values
        assert!(recipient_values
            .check_against(&structure, ValuesRole::Issuer, system)
            .is_err());
    }

    #[test]
    fn values_check_against_rejects_unknown_and_oversized() {
        let system = &GROUP_PARAMETERS.system;
        let structure = credential_structure();

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("name", "1139481716457488690172217916278103335").unwrap();
        builder.add_dec("unknown", "1").unwrap();
        let values = builder.finalize().unwrap();
        assert_eq!(
            UrsaCryptoErrorKind::InvalidStructure,
            values
                .check_against(&structure, ValuesRole::Issuer, system)
                .unwrap_err()
                .kind()
        );

        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_integer("name", BigNumber::power_of_two(system.l_m).unwrap()).unwrap();
        builder
            .add_commitment("level", BigNumber::from_u32(1).unwrap())
            .unwrap();
        let values = builder.finalize().unwrap();
        assert!(values.check_against(&structure, ValuesRole::Issuer, system).is_err());
    }

    #[test]
    fn values_builder_rejects_duplicates() {
        let mut builder = ValuesBuilder::new().unwrap();
        builder.add_dec("name", "1").unwrap();
        assert!(builder.add_dec("name", "2").is_err());
    }

    #[test]
    fn commitment_opening_verifies() {
        let key = ISSUER_KEY_PAIR.public_key.commitment_key(3).unwrap();
        assert_eq!(ISSUER_KEY_PAIR.public_key.z, key.bases[0]);
        assert_eq!(ISSUER_KEY_PAIR.public_key.r[2], key.bases[2]);

        let messages = vec![
            BigNumber::from_u32(1).unwrap(),
            BigNumber::from_u32(2).unwrap(),
            BigNumber::from_u32(3).unwrap(),
        ];
        let opening = key.commit(&messages).unwrap();
        assert!(opening.verify().unwrap());

        let mut other = opening.clone();
        other.messages[1] = BigNumber::from_u32(5).unwrap();
        assert!(!other.verify().unwrap());

        assert!(ISSUER_KEY_PAIR.public_key.commitment_key(0).is_err());
        assert!(ISSUER_KEY_PAIR.public_key.commitment_key(100).is_err());
    }

    #[test]
    fn representation_verifies_opening() {
        let pk = &ISSUER_KEY_PAIR.public_key;
        let exponents = vec![BigNumber::from_u32(17).unwrap(), BigNumber::from_u32(4).unwrap()];
        let (representation, opening) =
            Representation::new(&[pk.r[1].clone(), pk.r[2].clone()], &exponents, &pk.n).unwrap();
        assert!(representation.verify_opening(&opening).unwrap());

        let wrong = RepresentationOpening {
            exponents: vec![BigNumber::from_u32(17).unwrap(), BigNumber::from_u32(5).unwrap()],
        };
        assert!(!representation.verify_opening(&wrong).unwrap());
    }

    #[test]
    fn epochs_are_computed_from_epoch_length() {
        let pk = &ISSUER_KEY_PAIR.public_key;
        assert_eq!(Some(86400), pk.epoch_length);
        assert_eq!(0, pk.compute_epoch(86399).unwrap());
        assert_eq!(2, pk.compute_epoch(2 * 86400 + 5).unwrap());
        assert!(pk.current_epoch().unwrap() > 19000);

        let mut no_epoch = pk.clone();
        no_epoch.epoch_length = None;
        assert!(no_epoch.compute_epoch(1).is_err());
    }

    #[test]
    fn issuance_spec_rejects_too_many_attributes() {
        let mut builder = CredentialStructureBuilder::new().unwrap();
        for i in 0..=ISSUER_KEY_PAIR.public_key.attribute_capacity() {
            builder
                .add_attribute(&format!("attr{}", i), AttributeKind::Hidden, AttributeType::Int)
                .unwrap();
        }
        let structure = builder.finalize().unwrap();
        assert!(IssuanceSpec::new(&ISSUER_KEY_PAIR.public_key, &structure).is_err());
    }

    #[test]
    fn master_secret_is_bound_to_group() {
        let ms = MasterSecret::new(&GROUP_PARAMETERS).unwrap();
        ms.check_group(&GROUP_PARAMETERS).unwrap();

        let mut other = GROUP_PARAMETERS.clone();
        other.h = other.g.clone();
        assert!(ms.check_group(&other).is_err());
    }
}
