use serde::{Deserialize, Serialize};

#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Copy,
            Clone,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        #[serde(transparent)] // JSON = plain UUID string
        pub struct $name(pub uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            #[inline]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
            #[inline]
            pub fn from_uuid(u: uuid::Uuid) -> Self {
                Self(u)
            }
            #[inline]
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl core::str::FromStr for $name {
            type Err = uuid::Error;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }

        impl core::convert::TryFrom<&str> for $name {
            type Error = uuid::Error;
            fn try_from(s: &str) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(v: uuid::Uuid) -> Self {
                Self(v)
            }
        }
        impl From<$name> for uuid::Uuid {
            fn from(v: $name) -> uuid::Uuid {
                v.0
            }
        }
        impl AsRef<uuid::Uuid> for $name {
            fn as_ref(&self) -> &uuid::Uuid {
                &self.0
            }
        }
    };
}

define_id!(PlayerId);
define_id!(ClanId);
define_id!(SessionId);

/// Stable item instance id, assigned by the persistence layer and carried on
/// the wire as a plain integer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl ItemId {
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
impl From<ItemId> for u64 {
    fn from(v: ItemId) -> u64 {
        v.0
    }
}

/// Immutable template id resolved through the item catalog.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct TemplateId(pub u32);

impl core::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TemplateId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
impl From<TemplateId> for u32 {
    fn from(v: TemplateId) -> u32 {
        v.0
    }
}

/// Skill line referenced by equip requirements and learned-skill tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct SkillId(pub u32);

impl core::fmt::Display for SkillId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SkillId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// The unit of lock granularity. Every container belongs to exactly one
/// owner, and one mutex per owner guards all of its state.
///
/// The derived `Ord` (Player variants before Clan variants, then by id) is
/// the global lock acquisition order for cross-owner transactions; it must
/// not be reordered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwnerKey {
    Player(PlayerId),
    Clan(ClanId),
}

impl OwnerKey {
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            OwnerKey::Player(id) => Some(*id),
            OwnerKey::Clan(_) => None,
        }
    }

    pub fn as_clan(&self) -> Option<ClanId> {
        match self {
            OwnerKey::Player(_) => None,
            OwnerKey::Clan(id) => Some(*id),
        }
    }

    pub fn is_clan(&self) -> bool {
        matches!(self, OwnerKey::Clan(_))
    }
}

impl core::fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OwnerKey::Player(id) => write!(f, "player:{id}"),
            OwnerKey::Clan(id) => write!(f, "clan:{id}"),
        }
    }
}

impl From<PlayerId> for OwnerKey {
    fn from(id: PlayerId) -> Self {
        OwnerKey::Player(id)
    }
}
impl From<ClanId> for OwnerKey {
    fn from(id: ClanId) -> Self {
        OwnerKey::Clan(id)
    }
}

/// The named container families a single owner can hold.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerKind {
    Personal,
    Home,
    Equipped,
    WeaponDrawer,
    ClanLockbox,
}

/// Slot reserved in `Equipped` for mirroring the active weapon, so
/// appearance and stat code can find it without scanning the drawer.
pub const ACTIVE_WEAPON_MIRROR_SLOT: u32 = 13;

impl ContainerKind {
    /// Fixed slot-array size for this kind. For `ClanLockbox` this is the
    /// fully unlocked size; the usable range is gated by purchased tabs.
    #[inline]
    pub fn capacity(&self) -> u32 {
        match self {
            ContainerKind::Personal => 250,
            ContainerKind::Home => 480,
            ContainerKind::Equipped => 22,
            ContainerKind::WeaponDrawer => 5,
            ContainerKind::ClanLockbox => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Personal => "personal",
            ContainerKind::Home => "home",
            ContainerKind::Equipped => "equipped",
            ContainerKind::WeaponDrawer => "weapon_drawer",
            ContainerKind::ClanLockbox => "clan_lockbox",
        }
    }

    /// Kinds that hang off a player owner (everything except the lockbox).
    pub fn is_player_kind(&self) -> bool {
        !matches!(self, ContainerKind::ClanLockbox)
    }
}

impl core::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform container address: `(owner, kind)` picks one slot array, no
/// per-kind branching anywhere in transaction logic.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef {
    pub owner: OwnerKey,
    pub kind: ContainerKind,
}

impl ContainerRef {
    pub fn new(owner: impl Into<OwnerKey>, kind: ContainerKind) -> Self {
        Self { owner: owner.into(), kind }
    }

    pub fn personal(player: PlayerId) -> Self {
        Self::new(player, ContainerKind::Personal)
    }

    pub fn home(player: PlayerId) -> Self {
        Self::new(player, ContainerKind::Home)
    }

    pub fn equipped(player: PlayerId) -> Self {
        Self::new(player, ContainerKind::Equipped)
    }

    pub fn weapon_drawer(player: PlayerId) -> Self {
        Self::new(player, ContainerKind::WeaponDrawer)
    }

    pub fn lockbox(clan: ClanId) -> Self {
        Self::new(clan, ContainerKind::ClanLockbox)
    }
}

impl core::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.kind)
    }
}
