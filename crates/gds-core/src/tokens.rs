//! Stored OAuth token record and the field-preserving merge rule.
//!
//! Google's token endpoint omits fields it considers unchanged, most
//! importantly the refresh token, which is usually only returned on the very
//! first exchange. Every persistence path therefore merges the response into
//! the stored record instead of replacing it wholesale, so a long-lived
//! refresh token survives routine access-token refreshes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token record
// ---------------------------------------------------------------------------

/// The token record as persisted in the config document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenSet {
    /// Bearer token for authenticating API requests.
    pub access_token: String,
    /// Token for refreshing the access token without user interaction.
    /// Usually absent from refresh responses; preserved by the merge rule.
    pub refresh_token: Option<String>,
    /// Space-separated scopes the token was granted.
    pub scope: String,
    /// Token type as reported by the endpoint, e.g. `Bearer`.
    pub token_type: String,
    /// OpenID Connect identity token, when the scopes include identity.
    pub id_token: Option<String>,
    /// Expiry instant in epoch milliseconds.
    pub expiry_date: i64,
}

impl TokenSet {
    /// Returns true if the access token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_within(chrono::Duration::zero())
    }

    /// Returns true if the access token will expire within the given margin.
    ///
    /// An unrepresentable expiry instant counts as expired.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        match DateTime::<Utc>::from_timestamp_millis(self.expiry_date) {
            Some(expires_at) => Utc::now() + margin >= expires_at,
            None => true,
        }
    }

    /// Merge a token response into this record.
    ///
    /// Fields present in `update` overwrite the stored values; fields the
    /// response omitted are retained unchanged.
    pub fn merged_with(&self, update: &TokenUpdate) -> TokenSet {
        let mut merged = self.clone();
        if let Some(access_token) = &update.access_token {
            merged.access_token = access_token.clone();
        }
        if let Some(refresh_token) = &update.refresh_token {
            merged.refresh_token = Some(refresh_token.clone());
        }
        if let Some(scope) = &update.scope {
            merged.scope = scope.clone();
        }
        if let Some(token_type) = &update.token_type {
            merged.token_type = token_type.clone();
        }
        if let Some(id_token) = &update.id_token {
            merged.id_token = Some(id_token.clone());
        }
        if let Some(expiry_date) = update.expiry_date {
            merged.expiry_date = expiry_date;
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Partial response
// ---------------------------------------------------------------------------

/// A token response as received from the endpoint: any subset of the record's
/// fields may be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub id_token: Option<String>,
    pub expiry_date: Option<i64>,
}

impl TokenUpdate {
    /// Merge this response onto an optional stored record.
    ///
    /// With no stored record the result contains exactly the response fields
    /// over defaults (the first exchange ever).
    pub fn merge_into(&self, stored: Option<&TokenSet>) -> TokenSet {
        match stored {
            Some(existing) => existing.merged_with(self),
            None => TokenSet::default().merged_with(self),
        }
    }
}
