//! Legacy post identifiers.
//!
//! A post is addressed by its author DID and record key; the legacy client
//! also needs the indexing time and, for reposts, the reposting actor. Those
//! are folded with the compactor as
//! `author/rkey/indexed_at[/reposted_by]`.
//!
//! The raw compactor skips unknown characters, which would make two different
//! posts collide. This layer refuses any field it could not round-trip
//! instead, so a successfully encoded ID always decodes to the same
//! [`PostRef`]. The result is arbitrary precision and never truncated to
//! 64 bits.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;

use super::compact::{int_to_string, string_to_int, symbol_value, COMPOUND_DELIMITER};
use super::CodecError;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// `at://<authority>/<collection>/<rkey>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    pub fn parse(uri: &str) -> Result<Self, CodecError> {
        let invalid = || CodecError::InvalidAtUri(uri.to_string());

        let rest = uri.strip_prefix("at://").ok_or_else(invalid)?;
        let mut parts = rest.split('/');
        let (Some(authority), Some(collection), Some(rkey), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if authority.is_empty() || collection.is_empty() || rkey.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            authority: authority.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        })
    }
}

impl FromStr for AtUri {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

/// Everything the legacy client needs to address a post in a timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub author_did: String,
    pub rkey: String,
    /// Unix seconds.
    pub indexed_at: u64,
    pub reposted_by: Option<String>,
}

impl PostRef {
    pub fn from_uri(
        uri: &AtUri,
        indexed_at: u64,
        reposted_by: Option<String>,
    ) -> Result<Self, CodecError> {
        if uri.collection != POST_COLLECTION {
            return Err(CodecError::InvalidAtUri(uri.to_string()));
        }
        Ok(Self {
            author_did: uri.authority.clone(),
            rkey: uri.rkey.clone(),
            indexed_at,
            reposted_by,
        })
    }

    pub fn uri(&self) -> AtUri {
        AtUri {
            authority: self.author_did.clone(),
            collection: POST_COLLECTION.to_string(),
            rkey: self.rkey.clone(),
        }
    }
}

fn check_field(field: &str) -> Result<(), CodecError> {
    let encodable = !field.is_empty()
        && field
            .chars()
            .all(|c| c != COMPOUND_DELIMITER && symbol_value(c).is_some());
    if encodable {
        Ok(())
    } else {
        Err(CodecError::UnencodableField(field.to_string()))
    }
}

pub fn encode_post_id(post: &PostRef) -> Result<BigUint, CodecError> {
    // A leading '0' symbol has no positional value and would be lost.
    if post.author_did.starts_with('0') {
        return Err(CodecError::UnencodableField(post.author_did.clone()));
    }

    let indexed_at = post.indexed_at.to_string();
    let mut fields = vec![post.author_did.as_str(), post.rkey.as_str(), indexed_at.as_str()];
    if let Some(reposter) = &post.reposted_by {
        fields.push(reposter);
    }
    for field in &fields {
        check_field(field)?;
    }

    let delimiter = COMPOUND_DELIMITER.to_string();
    let joined = fields.join(delimiter.as_str());
    Ok(string_to_int(&joined))
}

pub fn decode_post_id(id: &BigUint) -> Result<PostRef, CodecError> {
    let joined = int_to_string(id);
    let fields: Vec<&str> = joined.split(COMPOUND_DELIMITER).collect();

    let (author_did, rkey, indexed_at, reposted_by) = match fields.as_slice() {
        [author, rkey, indexed_at] => (*author, *rkey, *indexed_at, None),
        [author, rkey, indexed_at, reposter] => (*author, *rkey, *indexed_at, Some(*reposter)),
        _ => return Err(CodecError::CorruptCompound),
    };
    if author_did.is_empty() || rkey.is_empty() || reposted_by.is_some_and(str::is_empty) {
        return Err(CodecError::CorruptCompound);
    }
    let indexed_at = indexed_at
        .parse::<u64>()
        .map_err(|_| CodecError::CorruptCompound)?;

    Ok(PostRef {
        author_did: author_did.to_string(),
        rkey: rkey.to_string(),
        indexed_at,
        reposted_by: reposted_by.map(str::to_string),
    })
}
