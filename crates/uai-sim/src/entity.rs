//! Entities of the reference world and the templates they are made from.
//!
//! Every part is optional; a tree is a position plus a resource supply, a
//! soldier is a position, health, an attack and a vision range.  The rules
//! attached to each part are deliberately simple stand-ins for the real
//! movement, combat, economy and construction systems.

use uai_behavior::{AttackTiming, AttackType};
use uai_core::{EntityId, PlayerId, Point, RangeBand, ResourceType};

// ── Parts ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Mobility {
    /// Metres per second.
    pub walk_speed: f32,
    pub run_speed:  f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Health {
    pub hp:     u32,
    pub max_hp: u32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Attack {
    pub kind:   AttackType,
    pub damage: u32,
    pub range:  RangeBand,
    pub timing: AttackTiming,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Gatherer {
    /// Amount taken per gather tick.
    pub rate:  f32,
    pub range: RangeBand,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Supply {
    pub resource:   ResourceType,
    pub amount:     f32,
    /// A live animal: it has to be killed before it can be gathered.
    pub kill_first: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Builder {
    /// Progress added per repair tick.
    pub rate:  f32,
    pub range: RangeBand,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Foundation {
    pub progress: f32,
    pub needed:   f32,
    /// Template of the finished building.
    pub becomes:  String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GarrisonHolder {
    pub capacity:  usize,
    pub occupants: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Formation {
    pub members: Vec<EntityId>,
    /// Distance between ranks.
    pub spacing: f32,
}

/// Where an entity is currently heading.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Movement {
    Point(Point),
    /// Until `target` is within `band.max`.
    Range { target: EntityId, band: RangeBand },
    /// Keep `offset` from the controller.
    Formation { controller: EntityId, offset: Point },
}

// ── Entity ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Entity {
    pub id:            EntityId,
    pub template:      String,
    pub owner:         PlayerId,
    /// `None` while garrisoned.
    pub position:      Option<Point>,
    pub mobility:      Option<Mobility>,
    pub movement:      Option<Movement>,
    pub health:        Option<Health>,
    pub attack:        Option<Attack>,
    pub gatherer:      Option<Gatherer>,
    pub supply:        Option<Supply>,
    pub builder:       Option<Builder>,
    pub foundation:    Option<Foundation>,
    pub garrison:      Option<GarrisonHolder>,
    pub formation:     Option<Formation>,
    pub vision:        Option<f32>,
    pub visual:        bool,
    pub animation:     String,
    pub control_group: EntityId,
    /// Set when the entity should leave the world at the end of the turn.
    pub doomed:        bool,
}

impl Entity {
    pub fn from_template(id: EntityId, template: &Template, owner: PlayerId, position: Point) -> Self {
        Self {
            id,
            template: template.name.clone(),
            owner,
            position: Some(position),
            mobility: template.mobility,
            movement: None,
            health: template.max_hp.map(|max_hp| Health { hp: max_hp, max_hp }),
            attack: template.attack,
            gatherer: template.gatherer,
            supply: template.supply.clone(),
            builder: template.builder,
            foundation: template.foundation.clone(),
            garrison: template.garrison_capacity.map(|capacity| GarrisonHolder { capacity, occupants: Vec::new() }),
            formation: None,
            vision: template.vision,
            visual: template.visual,
            animation: String::new(),
            control_group: id,
            doomed: false,
        }
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.health.is_none_or(|h| h.hp > 0)
    }

    pub fn is_damage_receiver(&self) -> bool {
        self.health.is_some_and(|h| h.hp > 0)
    }

    #[inline]
    pub fn can_move(&self) -> bool {
        self.mobility.is_some_and(|m| m.walk_speed > 0.0)
    }

    /// Dead units and exhausted or replaced entities leave the world at the
    /// end of the turn.  A dead animal stays as a carcass until eaten.
    pub fn is_expired(&self) -> bool {
        self.doomed || (self.supply.is_none() && !self.is_alive())
    }
}

// ── Template ──────────────────────────────────────────────────────────────────

/// Recipe for an entity.  Units (`unit_ai == true`) get a behavior
/// controller when spawned.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub name:              String,
    pub unit_ai:           bool,
    pub mobility:          Option<Mobility>,
    pub max_hp:            Option<u32>,
    pub attack:            Option<Attack>,
    pub gatherer:          Option<Gatherer>,
    pub supply:            Option<Supply>,
    pub builder:           Option<Builder>,
    pub foundation:        Option<Foundation>,
    pub garrison_capacity: Option<usize>,
    pub vision:            Option<f32>,
    pub visual:            bool,
}

const WALKER: Mobility = Mobility { walk_speed: 9.0, run_speed: 15.0 };
const RIDER: Mobility = Mobility { walk_speed: 16.0, run_speed: 24.0 };

impl Template {
    fn base(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            unit_ai: false,
            mobility: None,
            max_hp: None,
            attack: None,
            gatherer: None,
            supply: None,
            builder: None,
            foundation: None,
            garrison_capacity: None,
            vision: None,
            visual: true,
        }
    }

    fn unit(name: &str, mobility: Mobility, max_hp: u32, vision: f32) -> Self {
        Self {
            unit_ai: true,
            mobility: Some(mobility),
            max_hp: Some(max_hp),
            vision: Some(vision),
            ..Self::base(name)
        }
    }

    fn supply(name: &str, generic: &str, specific: &str, amount: f32) -> Self {
        Self {
            supply: Some(Supply { resource: ResourceType::new(generic, specific), amount, kill_first: false }),
            ..Self::base(name)
        }
    }

    /// Stock templates: `infantry`, `archer`, `cavalry`, `worker`, `deer`,
    /// `tree`, `stone`, `field`, `house`, `house_foundation`,
    /// `field_foundation`.
    pub fn named(name: &str) -> Option<Template> {
        let t = match name {
            "infantry" => Self {
                attack: Some(Attack {
                    kind:   AttackType::Melee,
                    damage: 10,
                    range:  RangeBand::within(4.0),
                    timing: AttackTiming { prepare_ms: 500, repeat_ms: 1_000 },
                }),
                builder: Some(Builder { rate: 1.0, range: RangeBand::within(6.0) }),
                ..Self::unit(name, WALKER, 100, 40.0)
            },
            "archer" => Self {
                attack: Some(Attack {
                    kind:   AttackType::Ranged,
                    damage: 6,
                    range:  RangeBand::within(30.0),
                    timing: AttackTiming { prepare_ms: 1_000, repeat_ms: 1_500 },
                }),
                ..Self::unit(name, WALKER, 70, 48.0)
            },
            "cavalry" => Self {
                attack: Some(Attack {
                    kind:   AttackType::Melee,
                    damage: 14,
                    range:  RangeBand::within(5.0),
                    timing: AttackTiming { prepare_ms: 500, repeat_ms: 1_250 },
                }),
                ..Self::unit(name, RIDER, 150, 52.0)
            },
            "worker" => Self {
                attack: Some(Attack {
                    kind:   AttackType::Melee,
                    damage: 3,
                    range:  RangeBand::within(4.0),
                    timing: AttackTiming { prepare_ms: 500, repeat_ms: 1_500 },
                }),
                gatherer: Some(Gatherer { rate: 1.0, range: RangeBand::within(4.0) }),
                builder: Some(Builder { rate: 1.0, range: RangeBand::within(6.0) }),
                ..Self::unit(name, WALKER, 50, 32.0)
            },
            "deer" => Self {
                mobility: Some(WALKER),
                max_hp: Some(20),
                supply: Some(Supply {
                    resource:   ResourceType::new("food", "meat"),
                    amount:     100.0,
                    kill_first: true,
                }),
                ..Self::base(name)
            },
            "tree" => Self::supply(name, "wood", "tree", 200.0),
            "stone" => Self::supply(name, "stone", "rock", 500.0),
            "field" => Self::supply(name, "food", "grain", 1_000.0),
            "house" => Self { max_hp: Some(500), garrison_capacity: Some(5), ..Self::base(name) },
            "house_foundation" => Self {
                max_hp: Some(500),
                foundation: Some(Foundation { progress: 0.0, needed: 10.0, becomes: "house".to_owned() }),
                ..Self::base(name)
            },
            "field_foundation" => Self {
                foundation: Some(Foundation { progress: 0.0, needed: 5.0, becomes: "field".to_owned() }),
                ..Self::base(name)
            },
            _ => return None,
        };
        Some(t)
    }

    /// The virtual entity steering a formation.  Its speed is set from the
    /// slowest member when the formation is made.
    pub(crate) fn formation_controller() -> Template {
        Self { visual: false, ..Self::base("formation") }
    }
}
