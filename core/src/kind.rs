//! Closed set of entity archetypes and the hostile classifier.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! entity_kinds {
    ($($variant:ident => $name:literal, $tracked:literal;)+) => {
        /// Archetype of an entity living in the host world.
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub enum EntityKind {
            $(
                #[doc = concat!("The `", $name, "` archetype.")]
                $variant,
            )+
        }

        impl EntityKind {
            /// Every archetype known at build time.
            pub const ALL: &'static [EntityKind] = &[$(EntityKind::$variant,)+];

            /// Canonical upper-case name of the archetype.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }

            /// Reports whether the archetype is hostile and subject to the
            /// population policies.
            #[must_use]
            pub const fn is_tracked(self) -> bool {
                match self {
                    $(Self::$variant => $tracked,)+
                }
            }
        }
    };
}

entity_kinds! {
    Zombie => "ZOMBIE", true;
    Skeleton => "SKELETON", true;
    Creeper => "CREEPER", true;
    Spider => "SPIDER", true;
    Enderman => "ENDERMAN", true;
    Witch => "WITCH", true;
    WitherSkeleton => "WITHER_SKELETON", true;
    Stray => "STRAY", true;
    Husk => "HUSK", true;
    ZombieVillager => "ZOMBIE_VILLAGER", true;
    SkeletonHorse => "SKELETON_HORSE", true;
    ZombieHorse => "ZOMBIE_HORSE", true;
    Phantom => "PHANTOM", true;
    Slime => "SLIME", true;
    MagmaCube => "MAGMA_CUBE", true;
    Ghast => "GHAST", true;
    Blaze => "BLAZE", true;
    Drowned => "DROWNED", true;
    Pillager => "PILLAGER", true;
    Vindicator => "VINDICATOR", true;
    Evoker => "EVOKER", true;
    Vex => "VEX", true;
    Ravager => "RAVAGER", true;
    Shulker => "SHULKER", true;
    Endermite => "ENDERMITE", true;
    Guardian => "GUARDIAN", true;
    ElderGuardian => "ELDER_GUARDIAN", true;
    Hoglin => "HOGLIN", true;
    Zoglin => "ZOGLIN", true;
    Piglin => "PIGLIN", true;
    PiglinBrute => "PIGLIN_BRUTE", true;
    Bogged => "BOGGED", true;
    Player => "PLAYER", false;
    Villager => "VILLAGER", false;
    Cow => "COW", false;
    Pig => "PIG", false;
    Sheep => "SHEEP", false;
    Chicken => "CHICKEN", false;
    Horse => "HORSE", false;
    Wolf => "WOLF", false;
    Cat => "CAT", false;
    IronGolem => "IRON_GOLEM", false;
}

impl EntityKind {
    /// Iterator over the hostile archetypes.
    pub fn tracked() -> impl Iterator<Item = EntityKind> {
        Self::ALL.iter().copied().filter(|kind| kind.is_tracked())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a name does not match any archetype.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown entity type `{0}`")]
pub struct UnknownEntityKind(pub String);

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    /// Accepts `ZOMBIE_VILLAGER`, `zombie_villager` or `zombie-villager`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| UnknownEntityKind(value.to_owned()))
    }
}
