//! Subsystem identifiers and their projection table.

use std::fmt;

use serde_json::Value;

use super::field::FieldValue;

/// One named block inside an API snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subsystem {
    ChargeDischargeCounter,
    PvAverager1Min,
    BatteryMeter,
    PrimaryGridMeter,
    ArbiterPower,
    PvChargeLimiter,
    PvMeter,
    Distributer1,
    Gem100,
    MaxAvgGrid,
    BatteryAverager1Min,
    DemandManagement1,
    GridAverager15Min,
    GridLessBatteryAverager1Min,
}

/// How a subsystem block is reduced to a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// A single inner key of the block.
    Field(&'static str),
    /// Every value of the block in document order.
    Tuple,
}

/// Identifier → projection, in output column order.
pub const SUBSYSTEMS: &[(Subsystem, Projection)] = &[
    (Subsystem::ChargeDischargeCounter, Projection::Tuple),
    (Subsystem::PvAverager1Min, Projection::Field("Averager")),
    (Subsystem::BatteryMeter, Projection::Field("ACPowerWattsSigned")),
    (Subsystem::PrimaryGridMeter, Projection::Field("ACPowerWattsSigned")),
    (Subsystem::ArbiterPower, Projection::Field("SystemDirectorPowerRequest")),
    (Subsystem::PvChargeLimiter, Projection::Field("PVChargeLimitWatts")),
    (Subsystem::PvMeter, Projection::Field("ACPowerWattsSigned")),
    (Subsystem::Distributer1, Projection::Field("AvailableCapacityWattHours")),
    (Subsystem::Gem100, Projection::Field("StateOfCharge")),
    (Subsystem::MaxAvgGrid, Projection::Field("MaxAverage")),
    (Subsystem::BatteryAverager1Min, Projection::Field("Averager")),
    (Subsystem::DemandManagement1, Projection::Field("ClippingLevel")),
    (Subsystem::GridAverager15Min, Projection::Field("Averager")),
    (Subsystem::GridLessBatteryAverager1Min, Projection::Tuple),
];

impl Subsystem {
    /// Block name as it appears in the API response.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ChargeDischargeCounter => "ChargeDischargeCounter",
            Self::PvAverager1Min => "1MinPVAverager",
            Self::BatteryMeter => "BatteryMeter",
            Self::PrimaryGridMeter => "PrimaryGridMeter",
            Self::ArbiterPower => "ArbiterPower",
            Self::PvChargeLimiter => "PVChargeLimiter",
            Self::PvMeter => "PVMeter",
            Self::Distributer1 => "Distributer1",
            Self::Gem100 => "GEM100",
            Self::MaxAvgGrid => "MaxAvgGrid",
            Self::BatteryAverager1Min => "1MinBatteryAverager",
            Self::DemandManagement1 => "DemandManagement1",
            Self::GridAverager15Min => "15MinGridAverager",
            Self::GridLessBatteryAverager1Min => "1MinGridLessBatteryAverager",
        }
    }

    /// Looks up an identifier by its API block name.
    pub fn from_name(name: &str) -> Option<Self> {
        SUBSYSTEMS
            .iter()
            .map(|(id, _)| *id)
            .find(|id| id.name() == name)
    }

    /// All identifier names, in column order.
    pub fn names() -> impl Iterator<Item = &'static str> {
        SUBSYSTEMS.iter().map(|(id, _)| id.name())
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Projection {
    /// Applies the projection to a block; an absent block or key yields `Missing`.
    pub fn apply(self, block: Option<&Value>) -> FieldValue {
        let Some(block) = block else {
            return FieldValue::Missing;
        };
        match self {
            Self::Field(key) => block
                .get(key)
                .map_or(FieldValue::Missing, FieldValue::from_json),
            Self::Tuple => match block {
                Value::Null => FieldValue::Missing,
                Value::Object(map) => FieldValue::Tuple(map.values().cloned().collect()),
                Value::Array(items) => FieldValue::Tuple(items.clone()),
                scalar => FieldValue::Tuple(vec![scalar.clone()]),
            },
        }
    }
}
