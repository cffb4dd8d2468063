//! Item envelopes: one ciphertext plus one wrapped key per authorized user.
//!
//! Every `seal` draws a fresh item key, encrypts the payload once, and wraps
//! the key for the owner and for each recipient. Adding a recipient later
//! (`rewrap`) never touches the ciphertext, and updating an item (`reseal`)
//! replaces the ciphertext but keeps the key.

use crate::cipher::{decrypt_json, decrypt_payload, encrypt_json, encrypt_payload};
use crate::error::{CryptoError, CryptoResult};
use crate::identity::Identity;
use crate::key::{SymmetricKey, generate_item_key};
use crate::keypair::{EncryptionKeyPair, parse_public_key, unwrap_key_from, wrap_key_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Encrypted item payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEnvelope {
    pub item_id: String,
    /// Base64 `nonce || ciphertext || tag` of the JSON-serialized item.
    pub ciphertext: String,
    /// Public key the owner's own record was wrapped with.
    pub owner_public_key: String,
}

/// One user's access to one item.
///
/// `wrapped_key` is the item key sealed under the shared secret of
/// (`recipient_public_key`, wrapper secret). The holder recomputes that
/// secret from `wrapper_public_key` and their own secret key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKeyRecord {
    pub item_id: String,
    pub recipient_user_id: String,
    pub recipient_public_key: String,
    pub wrapper_public_key: String,
    pub wrapped_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
}

/// A user an item is being sealed for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Recipient {
    pub fn new(user_id: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            public_key: public_key.into(),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Output of [`seal`]: the envelope and one key record per authorized user,
/// the owner's record first.
#[derive(Clone, Debug)]
pub struct SealedItem {
    pub envelope: ItemEnvelope,
    pub key_records: Vec<ItemKeyRecord>,
}

impl SealedItem {
    /// The record wrapping the item key for the envelope's owner key.
    pub fn owner_record(&self) -> Option<&ItemKeyRecord> {
        self.key_records
            .iter()
            .find(|r| r.recipient_public_key == self.envelope.owner_public_key)
    }

    pub fn record_for(&self, user_id: &str) -> Option<&ItemKeyRecord> {
        self.key_records
            .iter()
            .find(|r| r.recipient_user_id == user_id)
    }
}

/// Output of [`reseal`]: the replacement ciphertext and records for the
/// users the update grants access to.
#[derive(Clone, Debug)]
pub struct ResealedItem {
    pub item_id: String,
    pub ciphertext: String,
    pub added_records: Vec<ItemKeyRecord>,
}

impl ResealedItem {
    /// Replaces the ciphertext of `envelope` in place.
    pub fn apply_to(&self, envelope: &mut ItemEnvelope) -> CryptoResult<()> {
        if envelope.item_id != self.item_id {
            return Err(CryptoError::Encryption(format!(
                "update for item {} cannot replace item {}",
                self.item_id, envelope.item_id
            )));
        }
        envelope.ciphertext = self.ciphertext.clone();
        Ok(())
    }
}

/// Output of [`seal_file`]: raw file ciphertext plus a metadata envelope
/// keyed with the same item key.
#[derive(Clone, Debug)]
pub struct SealedFile {
    pub file_ciphertext: Vec<u8>,
    pub metadata: SealedItem,
}

/// Encrypts `item` under a fresh key and wraps that key for the owner and
/// every recipient. Duplicate recipients (and the owner listed as a
/// recipient) collapse to a single record.
pub fn seal(
    item_id: impl Into<String>,
    item: &Value,
    recipients: &[Recipient],
    owner: &Identity,
) -> CryptoResult<SealedItem> {
    let item_id = item_id.into();
    let key = generate_item_key();
    let ciphertext = encrypt_json(&key, item)?;
    let key_records = wrap_for_all(&item_id, &key, recipients, owner)?;

    Ok(SealedItem {
        envelope: ItemEnvelope {
            item_id,
            ciphertext,
            owner_public_key: owner.public_key(),
        },
        key_records,
    })
}

/// Encrypts a new version of an existing item under the key it already has.
///
/// `record` is a record the caller holds for the item. The key is recovered
/// from it, so every existing record keeps opening the new ciphertext.
/// `added` recipients get a fresh record for the same key; users who already
/// hold `record` are skipped.
pub fn reseal(
    record: &ItemKeyRecord,
    item: &Value,
    added: &[Recipient],
    identity: &Identity,
) -> CryptoResult<ResealedItem> {
    let key = recover_item_key(record, identity.encryption())?;
    let ciphertext = encrypt_json(&key, item)?;

    let mut seen: HashSet<&str> =
        HashSet::from([identity.user_id(), record.recipient_user_id.as_str()]);
    let added_records = added
        .iter()
        .filter(|recipient| seen.insert(recipient.user_id.as_str()))
        .map(|recipient| rewrap(&record.item_id, &key, recipient, identity.encryption()))
        .collect::<CryptoResult<Vec<_>>>()?;

    Ok(ResealedItem {
        item_id: record.item_id.clone(),
        ciphertext,
        added_records,
    })
}

/// Same key discipline as [`seal`] applied to a binary payload. The file is
/// encrypted raw; `metadata` becomes a normal envelope under the same key.
pub fn seal_file(
    file_id: impl Into<String>,
    bytes: &[u8],
    metadata: &Value,
    recipients: &[Recipient],
    owner: &Identity,
) -> CryptoResult<SealedFile> {
    let file_id = file_id.into();
    let key = generate_item_key();
    let file_ciphertext = encrypt_payload(&key, bytes)?;
    let ciphertext = encrypt_json(&key, metadata)?;
    let key_records = wrap_for_all(&file_id, &key, recipients, owner)?;

    Ok(SealedFile {
        file_ciphertext,
        metadata: SealedItem {
            envelope: ItemEnvelope {
                item_id: file_id,
                ciphertext,
                owner_public_key: owner.public_key(),
            },
            key_records,
        },
    })
}

/// Opens an envelope with the caller's key record.
///
/// Fails with [`CryptoError::Decryption`] if the record cannot be unwrapped
/// or the payload does not authenticate. Never substitutes default content.
pub fn open(envelope: &ItemEnvelope, record: &ItemKeyRecord, identity: &Identity) -> CryptoResult<Value> {
    if record.item_id != envelope.item_id {
        return Err(CryptoError::Decryption(format!(
            "key record for item {} cannot open item {}",
            record.item_id, envelope.item_id
        )));
    }
    open_wrapped(
        &envelope.ciphertext,
        &record.wrapped_key,
        &record.wrapper_public_key,
        identity.encryption(),
    )
}

/// Decrypts a raw file ciphertext produced by [`seal_file`].
pub fn open_file(file_ciphertext: &[u8], record: &ItemKeyRecord, identity: &Identity) -> CryptoResult<Vec<u8>> {
    let key = recover_item_key(record, identity.encryption())?;
    decrypt_payload(&key, file_ciphertext)
}

/// Decrypts an item given its loose wire fields: ciphertext, wrapped key and
/// the wrapper's public key.
pub fn open_wrapped(
    ciphertext: &str,
    wrapped_key: &str,
    wrapper_public_key: &str,
    keys: &EncryptionKeyPair,
) -> CryptoResult<Value> {
    let wrapper = parse_public_key(wrapper_public_key)
        .map_err(|e| CryptoError::Decryption(format!("unusable wrapper key: {e}")))?;
    let key = unwrap_key_from(wrapped_key, &wrapper, &keys.secret)?;
    decrypt_json(&key, ciphertext)
}

/// Unwraps the plain item key from a record the holder of `keys` owns.
pub fn recover_item_key(record: &ItemKeyRecord, keys: &EncryptionKeyPair) -> CryptoResult<SymmetricKey> {
    let wrapper = parse_public_key(&record.wrapper_public_key)
        .map_err(|e| CryptoError::Decryption(format!("unusable wrapper key: {e}")))?;
    unwrap_key_from(&record.wrapped_key, &wrapper, &keys.secret)
}

/// Wraps an existing item key for a new recipient without touching the
/// ciphertext.
pub fn rewrap(
    item_id: &str,
    plain_key: &SymmetricKey,
    recipient: &Recipient,
    wrapper: &EncryptionKeyPair,
) -> CryptoResult<ItemKeyRecord> {
    let recipient_pk = parse_public_key(&recipient.public_key)?;
    Ok(ItemKeyRecord {
        item_id: item_id.to_string(),
        recipient_user_id: recipient.user_id.clone(),
        recipient_public_key: recipient.public_key.clone(),
        wrapper_public_key: wrapper.public_base64(),
        wrapped_key: wrap_key_for(plain_key, &recipient_pk, &wrapper.secret)?,
        role: recipient.role.clone(),
        item_type: None,
    })
}

fn wrap_for_all(
    item_id: &str,
    key: &SymmetricKey,
    recipients: &[Recipient],
    owner: &Identity,
) -> CryptoResult<Vec<ItemKeyRecord>> {
    let owner_recipient = Recipient::new(owner.user_id(), owner.public_key());
    let mut records = vec![rewrap(item_id, key, &owner_recipient, owner.encryption())?];

    let mut seen: HashSet<&str> = HashSet::from([owner.user_id()]);
    for recipient in recipients {
        if !seen.insert(recipient.user_id.as_str()) {
            continue;
        }
        records.push(rewrap(item_id, key, recipient, owner.encryption())?);
    }
    Ok(records)
}
