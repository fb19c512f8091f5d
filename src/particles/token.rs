//! Token definitions and value-bearing particles

use crate::dson::{DsonValue, MapBuilder, MapReader, Output};
use crate::error::{DsonError, StageActionError};
use crate::primitives::{RadixAddress, Rri, UInt256};
use std::collections::BTreeMap;
use std::fmt;

pub const FIXED_SUPPLY_TOKEN_DEFINITION: &str = "radix.particles.fixed_supply_token_definition";
pub const MUTABLE_SUPPLY_TOKEN_DEFINITION: &str = "radix.particles.mutable_supply_token_definition";
pub const UNALLOCATED_TOKENS: &str = "radix.particles.unallocated_tokens";
pub const TRANSFERRABLE_TOKENS: &str = "radix.particles.transferrable_tokens";

/// Who may exercise a mint or burn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPermission {
    TokenOwnerOnly,
    All,
    None,
}

impl TokenPermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPermission::TokenOwnerOnly => "token_owner_only",
            TokenPermission::All => "all",
            TokenPermission::None => "none",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DsonError> {
        match s {
            "token_owner_only" => Ok(TokenPermission::TokenOwnerOnly),
            "all" => Ok(TokenPermission::All),
            "none" => Ok(TokenPermission::None),
            other => Err(DsonError::InvalidValue {
                field: "permissions".to_string(),
                reason: format!("unknown permission {other:?}"),
            }),
        }
    }

    /// Whether `actor` may act on a token owned by `owner` under this permission.
    pub fn allows(&self, actor: &RadixAddress, owner: &RadixAddress) -> bool {
        match self {
            TokenPermission::TokenOwnerOnly => actor == owner,
            TokenPermission::All => true,
            TokenPermission::None => false,
        }
    }
}

impl fmt::Display for TokenPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenPermissions {
    pub mint: TokenPermission,
    pub burn: TokenPermission,
}

impl TokenPermissions {
    pub fn owner_only() -> Self {
        TokenPermissions {
            mint: TokenPermission::TokenOwnerOnly,
            burn: TokenPermission::TokenOwnerOnly,
        }
    }

    /// Permissions attached to fixed-supply value particles.
    pub fn fixed() -> Self {
        TokenPermissions {
            mint: TokenPermission::None,
            burn: TokenPermission::None,
        }
    }

    fn to_dson(self) -> DsonValue {
        let mut map = BTreeMap::new();
        map.insert("burn".to_string(), DsonValue::from(self.burn.as_str()));
        map.insert("mint".to_string(), DsonValue::from(self.mint.as_str()));
        DsonValue::Map(map)
    }

    fn from_dson(value: &DsonValue) -> Result<Self, DsonError> {
        let reader = MapReader::plain(value)?;
        Ok(TokenPermissions {
            mint: TokenPermission::parse(reader.text("mint")?)?,
            burn: TokenPermission::parse(reader.text("burn")?)?,
        })
    }
}

impl Default for TokenPermissions {
    fn default() -> Self {
        Self::owner_only()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSupplyType {
    Fixed,
    Mutable,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenSupply {
    Fixed(UInt256),
    Mutable(TokenPermissions),
}

impl TokenSupply {
    pub fn supply_type(&self) -> TokenSupplyType {
        match self {
            TokenSupply::Fixed(_) => TokenSupplyType::Fixed,
            TokenSupply::Mutable(_) => TokenSupplyType::Mutable,
        }
    }
}

fn check_granularity(amount: &UInt256, granularity: &UInt256) -> Result<(), StageActionError> {
    if granularity.is_zero() {
        return Err(StageActionError::ZeroGranularity);
    }
    if !amount.is_multiple_of(granularity) {
        return Err(StageActionError::NotMultipleOfGranularity {
            amount: *amount,
            granularity: *granularity,
        });
    }
    Ok(())
}

fn dson_invalid(field: &str, err: StageActionError) -> DsonError {
    DsonError::InvalidValue {
        field: field.to_string(),
        reason: err.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenDefinitionParticle {
    rri: Rri,
    name: String,
    description: String,
    granularity: UInt256,
    icon_url: Option<String>,
    supply: TokenSupply,
}

impl TokenDefinitionParticle {
    pub fn new(
        rri: Rri,
        name: impl Into<String>,
        description: impl Into<String>,
        granularity: UInt256,
        icon_url: Option<String>,
        supply: TokenSupply,
    ) -> Result<Self, StageActionError> {
        match &supply {
            TokenSupply::Fixed(amount) => {
                if amount.is_zero() {
                    return Err(StageActionError::ZeroAmount);
                }
                check_granularity(amount, &granularity)?;
            }
            TokenSupply::Mutable(_) => check_granularity(&UInt256::ZERO, &granularity)?,
        }
        Ok(TokenDefinitionParticle {
            rri,
            name: name.into(),
            description: description.into(),
            granularity,
            icon_url,
            supply,
        })
    }

    pub fn rri(&self) -> &Rri {
        &self.rri
    }

    pub fn owner(&self) -> &RadixAddress {
        self.rri.address()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn granularity(&self) -> UInt256 {
        self.granularity
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref()
    }

    pub fn supply(&self) -> &TokenSupply {
        &self.supply
    }

    /// Mint/burn permissions; a fixed-supply token has none.
    pub fn permissions(&self) -> TokenPermissions {
        match &self.supply {
            TokenSupply::Fixed(_) => TokenPermissions::fixed(),
            TokenSupply::Mutable(permissions) => *permissions,
        }
    }

    pub fn serializer(&self) -> &'static str {
        match self.supply {
            TokenSupply::Fixed(_) => FIXED_SUPPLY_TOKEN_DEFINITION,
            TokenSupply::Mutable(_) => MUTABLE_SUPPLY_TOKEN_DEFINITION,
        }
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        let builder = MapBuilder::new(self.serializer(), output)
            .field("rri", self.rri.clone())
            .field("name", self.name.as_str())
            .field("description", self.description.as_str())
            .field("granularity", self.granularity)
            .optional("iconUrl", self.icon_url.clone());
        match &self.supply {
            TokenSupply::Fixed(supply) => builder.field("supply", *supply),
            TokenSupply::Mutable(permissions) => {
                builder.field("permissions", permissions.to_dson())
            }
        }
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        let supply = match reader.serializer()? {
            FIXED_SUPPLY_TOKEN_DEFINITION => TokenSupply::Fixed(reader.u256("supply")?),
            MUTABLE_SUPPLY_TOKEN_DEFINITION => {
                TokenSupply::Mutable(TokenPermissions::from_dson(reader.get("permissions")?)?)
            }
            other => return Err(DsonError::UnknownSerializer(other.to_string())),
        };
        let icon_url = match reader.optional("iconUrl") {
            Some(value) => Some(value.as_text("iconUrl")?.to_string()),
            None => None,
        };
        TokenDefinitionParticle::new(
            reader.rri("rri")?,
            reader.text("name")?,
            reader.text("description")?,
            reader.u256("granularity")?,
            icon_url,
            supply,
        )
        .map_err(|e| dson_invalid("supply", e))
    }
}

/// Supply of a mutable token not yet minted. Owned by the token itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnallocatedTokensParticle {
    token: Rri,
    amount: UInt256,
    granularity: UInt256,
    permissions: TokenPermissions,
    nonce: i64,
}

impl UnallocatedTokensParticle {
    pub fn new(
        token: Rri,
        amount: UInt256,
        granularity: UInt256,
        permissions: TokenPermissions,
        nonce: i64,
    ) -> Result<Self, StageActionError> {
        if amount.is_zero() {
            return Err(StageActionError::ZeroAmount);
        }
        check_granularity(&amount, &granularity)?;
        Ok(UnallocatedTokensParticle {
            token,
            amount,
            granularity,
            permissions,
            nonce,
        })
    }

    pub fn token(&self) -> &Rri {
        &self.token
    }

    pub fn amount(&self) -> UInt256 {
        self.amount
    }

    pub fn granularity(&self) -> UInt256 {
        self.granularity
    }

    pub fn permissions(&self) -> TokenPermissions {
        self.permissions
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        MapBuilder::new(UNALLOCATED_TOKENS, output)
            .field("tokenDefinitionReference", self.token.clone())
            .field("amount", self.amount)
            .field("granularity", self.granularity)
            .field("permissions", self.permissions.to_dson())
            .field("nonce", self.nonce)
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        UnallocatedTokensParticle::new(
            reader.rri("tokenDefinitionReference")?,
            reader.u256("amount")?,
            reader.u256("granularity")?,
            TokenPermissions::from_dson(reader.get("permissions")?)?,
            reader.int("nonce")?,
        )
        .map_err(|e| dson_invalid("amount", e))
    }
}

/// An owned, spendable amount of a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferrableTokensParticle {
    address: RadixAddress,
    token: Rri,
    amount: UInt256,
    granularity: UInt256,
    permissions: TokenPermissions,
    planck: i64,
    nonce: i64,
}

impl TransferrableTokensParticle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: RadixAddress,
        token: Rri,
        amount: UInt256,
        granularity: UInt256,
        permissions: TokenPermissions,
        planck: i64,
        nonce: i64,
    ) -> Result<Self, StageActionError> {
        if amount.is_zero() {
            return Err(StageActionError::ZeroAmount);
        }
        check_granularity(&amount, &granularity)?;
        Ok(TransferrableTokensParticle {
            address,
            token,
            amount,
            granularity,
            permissions,
            planck,
            nonce,
        })
    }

    pub fn address(&self) -> &RadixAddress {
        &self.address
    }

    pub fn token(&self) -> &Rri {
        &self.token
    }

    pub fn amount(&self) -> UInt256 {
        self.amount
    }

    pub fn granularity(&self) -> UInt256 {
        self.granularity
    }

    pub fn permissions(&self) -> TokenPermissions {
        self.permissions
    }

    pub fn planck(&self) -> i64 {
        self.planck
    }

    pub fn nonce(&self) -> i64 {
        self.nonce
    }

    pub(crate) fn to_dson(&self, output: Output) -> MapBuilder {
        MapBuilder::new(TRANSFERRABLE_TOKENS, output)
            .field("address", self.address)
            .field("tokenDefinitionReference", self.token.clone())
            .field("amount", self.amount)
            .field("granularity", self.granularity)
            .field("permissions", self.permissions.to_dson())
            .field("planck", self.planck)
            .field("nonce", self.nonce)
    }

    pub(crate) fn from_reader(reader: &MapReader<'_>) -> Result<Self, DsonError> {
        TransferrableTokensParticle::new(
            reader.address("address")?,
            reader.rri("tokenDefinitionReference")?,
            reader.u256("amount")?,
            reader.u256("granularity")?,
            TokenPermissions::from_dson(reader.get("permissions")?)?,
            reader.int("planck")?,
            reader.int("nonce")?,
        )
        .map_err(|e| dson_invalid("amount", e))
    }
}

/// Minute-resolution clock stamped into new value particles.
pub fn current_planck() -> i64 {
    chrono::Utc::now().timestamp_millis() / 60_000 + 60
}
