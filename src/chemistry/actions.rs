//! User intent, before it is expanded into particles

use crate::particles::{TokenPermissions, TokenSupplyType};
use crate::primitives::{RadixAddress, Rri, UInt256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTokenAction {
    pub creator: RadixAddress,
    pub name: String,
    /// Symbol; becomes the RRI name.
    pub iso: String,
    pub description: String,
    pub initial_supply: UInt256,
    pub granularity: UInt256,
    pub icon_url: Option<String>,
    pub supply_type: TokenSupplyType,
    /// Only meaningful for mutable supply.
    pub permissions: TokenPermissions,
}

impl CreateTokenAction {
    pub fn new(
        creator: RadixAddress,
        name: impl Into<String>,
        iso: impl Into<String>,
        description: impl Into<String>,
        initial_supply: UInt256,
        granularity: UInt256,
        supply_type: TokenSupplyType,
    ) -> Self {
        CreateTokenAction {
            creator,
            name: name.into(),
            iso: iso.into(),
            description: description.into(),
            initial_supply,
            granularity,
            icon_url: None,
            supply_type,
            permissions: TokenPermissions::owner_only(),
        }
    }

    pub fn with_icon_url(mut self, url: impl Into<String>) -> Self {
        self.icon_url = Some(url.into());
        self
    }

    pub fn with_permissions(mut self, permissions: TokenPermissions) -> Self {
        self.permissions = permissions;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTokensAction {
    pub from: RadixAddress,
    pub to: RadixAddress,
    pub token: Rri,
    pub amount: UInt256,
    pub attachment: Option<Vec<u8>>,
}

impl TransferTokensAction {
    pub fn new(from: RadixAddress, to: RadixAddress, token: Rri, amount: UInt256) -> Self {
        TransferTokensAction {
            from,
            to,
            token,
            amount,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: impl Into<Vec<u8>>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnTokensAction {
    pub address: RadixAddress,
    pub token: Rri,
    pub amount: UInt256,
}

/// Mints new supply of a mutable token to the minting address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintTokensAction {
    pub address: RadixAddress,
    pub token: Rri,
    pub amount: UInt256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageAction {
    pub from: RadixAddress,
    pub to: RadixAddress,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutUniqueIdAction {
    pub address: RadixAddress,
    pub unique: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    CreateToken(CreateTokenAction),
    TransferTokens(TransferTokensAction),
    BurnTokens(BurnTokensAction),
    MintTokens(MintTokensAction),
    SendMessage(SendMessageAction),
    PutUniqueId(PutUniqueIdAction),
}

impl UserAction {
    /// The address whose key must sign the resulting atom.
    pub fn signer(&self) -> &RadixAddress {
        match self {
            UserAction::CreateToken(a) => &a.creator,
            UserAction::TransferTokens(a) => &a.from,
            UserAction::BurnTokens(a) => &a.address,
            UserAction::MintTokens(a) => &a.address,
            UserAction::SendMessage(a) => &a.from,
            UserAction::PutUniqueId(a) => &a.address,
        }
    }

    /// Addresses whose up particles the mapper for this action reads.
    pub fn required_state(&self) -> Vec<RadixAddress> {
        let mut addresses = vec![*self.signer()];
        let token_owner = match self {
            UserAction::BurnTokens(a) => Some(*a.token.address()),
            UserAction::MintTokens(a) => Some(*a.token.address()),
            UserAction::TransferTokens(a) => Some(*a.token.address()),
            _ => None,
        };
        if let Some(owner) = token_owner {
            if !addresses.contains(&owner) {
                addresses.push(owner);
            }
        }
        addresses
    }

    pub fn name(&self) -> &'static str {
        match self {
            UserAction::CreateToken(_) => "CreateToken",
            UserAction::TransferTokens(_) => "TransferTokens",
            UserAction::BurnTokens(_) => "BurnTokens",
            UserAction::MintTokens(_) => "MintTokens",
            UserAction::SendMessage(_) => "SendMessage",
            UserAction::PutUniqueId(_) => "PutUniqueId",
        }
    }
}

macro_rules! impl_from_action {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for UserAction {
                fn from(action: $ty) -> Self {
                    UserAction::$variant(action)
                }
            }
        )*
    };
}

impl_from_action! {
    CreateToken => CreateTokenAction,
    TransferTokens => TransferTokensAction,
    BurnTokens => BurnTokensAction,
    MintTokens => MintTokensAction,
    SendMessage => SendMessageAction,
    PutUniqueId => PutUniqueIdAction,
}
