//! Labware domain model.
//!
//! # Responsibility
//! - Define labware types (plates, racks) and the wells they own.
//! - Convert Opentrons labware definitions into the persisted shape.
//!
//! # Invariants
//! - `name` is the stable identity of a labware type.
//! - Well addresses are unique within one labware.
//! - Well offsets are relative to the labware's own reference corner.

use crate::model::validation::{
    ensure_finite, ensure_name, ensure_non_negative, EntityKind, EntityValidationError,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One receptacle inside a labware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Well {
    /// Grid address such as `A1`.
    pub address: String,
    pub depth: f64,
    pub diameter: f64,
    /// Offset of the well bottom from the labware reference corner.
    pub offset: DVec3,
}

/// A labware type with its vertical extent and wells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labware {
    pub name: String,
    /// Distance from the deck surface to the labware top.
    #[serde(rename = "zDimension")]
    pub z_dimension: f64,
    /// Wells in definition order.
    pub wells: Vec<Well>,
}

impl Labware {
    pub fn new(name: impl Into<String>, z_dimension: f64, wells: Vec<Well>) -> Self {
        Self {
            name: name.into(),
            z_dimension,
            wells,
        }
    }

    /// Finds one well by address.
    pub fn well(&self, address: &str) -> Option<&Well> {
        self.wells.iter().find(|well| well.address == address)
    }

    /// Validates write-path invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        ensure_name(EntityKind::Labware, &self.name)?;
        ensure_non_negative(EntityKind::Labware, &self.name, "zDimension", self.z_dimension)?;

        let mut seen = HashSet::with_capacity(self.wells.len());
        for well in &self.wells {
            ensure_name(EntityKind::Well, &well.address)?;
            ensure_non_negative(EntityKind::Well, &well.address, "depth", well.depth)?;
            ensure_non_negative(EntityKind::Well, &well.address, "diameter", well.diameter)?;
            ensure_finite(EntityKind::Well, &well.address, "x", well.offset.x)?;
            ensure_finite(EntityKind::Well, &well.address, "y", well.offset.y)?;
            ensure_finite(EntityKind::Well, &well.address, "z", well.offset.z)?;
            if !seen.insert(well.address.as_str()) {
                return Err(EntityValidationError::DuplicateChild {
                    kind: EntityKind::Well,
                    parent: self.name.clone(),
                    name: well.address.clone(),
                });
            }
        }
        Ok(())
    }

    /// Converts an Opentrons labware definition (JSON) into a labware.
    ///
    /// Well order follows the definition's `ordering` columns when present,
    /// otherwise column-major address order. Rectangular wells report the
    /// smaller footprint side as their diameter.
    pub fn from_opentrons_json(text: &str) -> Result<Self, LabwareImportError> {
        let definition: OpentronsDefinition = serde_json::from_str(text)?;
        let mut remaining = definition.wells;

        let mut ordered_addresses: Vec<String> = Vec::with_capacity(remaining.len());
        let mut listed = HashSet::with_capacity(remaining.len());
        for address in definition.ordering.into_iter().flatten() {
            if !listed.insert(address.clone()) {
                return Err(LabwareImportError::DuplicateOrderedWell(address));
            }
            ordered_addresses.push(address);
        }
        let mut leftovers: Vec<String> = remaining
            .keys()
            .filter(|address| !listed.contains(*address))
            .cloned()
            .collect();
        leftovers.sort_by_key(|address| address_sort_key(address));
        ordered_addresses.extend(leftovers);

        let mut wells = Vec::with_capacity(remaining.len());
        for address in ordered_addresses {
            let Some(well) = remaining.remove(&address) else {
                return Err(LabwareImportError::UnknownOrderedWell(address));
            };
            let diameter = match (well.diameter, well.x_dimension, well.y_dimension) {
                (Some(diameter), _, _) => diameter,
                (None, Some(x), Some(y)) => x.min(y),
                _ => return Err(LabwareImportError::MissingWellGeometry(address)),
            };
            wells.push(Well {
                address,
                depth: well.depth,
                diameter,
                offset: DVec3::new(well.x, well.y, well.z),
            });
        }

        let labware = Labware {
            name: definition.parameters.load_name,
            z_dimension: definition.dimensions.z_dimension,
            wells,
        };
        labware.validate()?;
        Ok(labware)
    }
}

/// Errors from converting external labware definitions.
#[derive(Debug)]
pub enum LabwareImportError {
    Json(serde_json::Error),
    /// Well has neither `diameter` nor `xDimension`/`yDimension`.
    MissingWellGeometry(String),
    /// `ordering` references a well missing from `wells`.
    UnknownOrderedWell(String),
    /// `ordering` lists the same well more than once.
    DuplicateOrderedWell(String),
    Validation(EntityValidationError),
}

impl Display for LabwareImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid labware definition: {err}"),
            Self::MissingWellGeometry(address) => {
                write!(f, "well `{address}` has no diameter or footprint")
            }
            Self::UnknownOrderedWell(address) => {
                write!(f, "ordering references unknown well `{address}`")
            }
            Self::DuplicateOrderedWell(address) => {
                write!(f, "ordering lists well `{address}` more than once")
            }
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LabwareImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::MissingWellGeometry(_)
            | Self::UnknownOrderedWell(_)
            | Self::DuplicateOrderedWell(_) => None,
        }
    }
}

impl From<serde_json::Error> for LabwareImportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<EntityValidationError> for LabwareImportError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

#[derive(Debug, Deserialize)]
struct OpentronsDefinition {
    parameters: OpentronsParameters,
    dimensions: OpentronsDimensions,
    wells: BTreeMap<String, OpentronsWell>,
    #[serde(default)]
    ordering: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpentronsParameters {
    load_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpentronsDimensions {
    z_dimension: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpentronsWell {
    depth: f64,
    #[serde(default)]
    diameter: Option<f64>,
    #[serde(default)]
    x_dimension: Option<f64>,
    #[serde(default)]
    y_dimension: Option<f64>,
    x: f64,
    y: f64,
    z: f64,
}

/// Column-major key: `B1` sorts before `A2`.
fn address_sort_key(address: &str) -> (u32, String) {
    let split = address
        .find(|ch: char| ch.is_ascii_digit())
        .unwrap_or(address.len());
    let (row, column) = address.split_at(split);
    (column.parse().unwrap_or(u32::MAX), row.to_string())
}

#[cfg(test)]
mod tests {
    use super::{address_sort_key, Labware, LabwareImportError, Well};
    use crate::model::validation::{EntityKind, EntityValidationError};
    use glam::DVec3;

    fn well(address: &str) -> Well {
        Well {
            address: address.to_string(),
            depth: 10.0,
            diameter: 5.0,
            offset: DVec3::new(1.0, 2.0, 0.5),
        }
    }

    #[test]
    fn validate_rejects_duplicate_well_addresses() {
        let labware = Labware::new("plate", 10.0, vec![well("A1"), well("A1")]);
        let err = labware.validate().unwrap_err();
        assert!(matches!(
            err,
            EntityValidationError::DuplicateChild {
                kind: EntityKind::Well,
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_negative_height_and_nan_offsets() {
        let labware = Labware::new("plate", -1.0, vec![]);
        assert!(matches!(
            labware.validate(),
            Err(EntityValidationError::Negative { .. })
        ));

        let mut bad = well("A1");
        bad.offset.y = f64::NAN;
        let labware = Labware::new("plate", 1.0, vec![bad]);
        assert!(matches!(
            labware.validate(),
            Err(EntityValidationError::NonFinite { field: "y", .. })
        ));
    }

    #[test]
    fn address_sort_key_is_column_major() {
        let mut addresses = vec!["A2", "B1", "A1", "A10", "H1"];
        addresses.sort_by_key(|address| address_sort_key(address));
        assert_eq!(addresses, vec!["A1", "B1", "H1", "A2", "A10"]);
    }

    #[test]
    fn opentrons_import_rejects_wells_without_geometry() {
        let text = r#"{
            "parameters": {"loadName": "odd"},
            "dimensions": {"zDimension": 5},
            "wells": {"A1": {"depth": 1, "x": 0, "y": 0, "z": 0}}
        }"#;
        let err = Labware::from_opentrons_json(text).unwrap_err();
        assert!(matches!(err, LabwareImportError::MissingWellGeometry(ref a) if a == "A1"));
    }

    #[test]
    fn opentrons_import_reports_repeated_ordering_entry() {
        let text = r#"{
            "parameters": {"loadName": "twice"},
            "dimensions": {"zDimension": 5},
            "ordering": [["A1", "B1"], ["A1"]],
            "wells": {
                "A1": {"depth": 1, "diameter": 2, "x": 0, "y": 9, "z": 0},
                "B1": {"depth": 1, "diameter": 2, "x": 0, "y": 0, "z": 0}
            }
        }"#;
        let err = Labware::from_opentrons_json(text).unwrap_err();
        assert!(matches!(err, LabwareImportError::DuplicateOrderedWell(ref a) if a == "A1"));
    }
}
