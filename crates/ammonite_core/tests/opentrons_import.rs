use ammonite_core::db::open_db_in_memory;
use ammonite_core::{
    LabwareImportError, LabwareImportServiceError, LabwareService, RepoError,
    SqliteLabwareRepository,
};
use std::fs;

const TIPRACK: &str = r#"{
    "ordering": [["A1", "B1"], ["A2", "B2"]],
    "metadata": {"displayName": "Demo 4 Tip Rack"},
    "dimensions": {"xDimension": 127.76, "yDimension": 85.48, "zDimension": 64.49},
    "wells": {
        "A2": {"depth": 59.3, "totalLiquidVolume": 300, "shape": "circular", "diameter": 5.23, "x": 23.38, "y": 74.24, "z": 5.19},
        "B1": {"depth": 59.3, "totalLiquidVolume": 300, "shape": "circular", "diameter": 5.23, "x": 14.38, "y": 65.24, "z": 5.19},
        "A1": {"depth": 59.3, "totalLiquidVolume": 300, "shape": "circular", "diameter": 5.23, "x": 14.38, "y": 74.24, "z": 5.19},
        "B2": {"depth": 59.3, "totalLiquidVolume": 300, "shape": "circular", "diameter": 5.23, "x": 23.38, "y": 65.24, "z": 5.19}
    },
    "parameters": {"format": "96Standard", "isTiprack": true, "loadName": "demo_4_tiprack_300ul"}
}"#;

const RESERVOIR: &str = r#"{
    "dimensions": {"zDimension": 44.45},
    "wells": {
        "A2": {"depth": 42.16, "shape": "rectangular", "xDimension": 8.33, "yDimension": 71.88, "x": 22.1, "y": 42.78, "z": 2.29},
        "A1": {"depth": 42.16, "shape": "rectangular", "xDimension": 8.33, "yDimension": 71.88, "x": 13.94, "y": 42.78, "z": 2.29}
    },
    "parameters": {"loadName": "demo_2_reservoir"}
}"#;

#[test]
fn import_persists_wells_in_definition_order() {
    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());

    let imported = service.import_opentrons(TIPRACK).unwrap();
    let stored = service.get_labware("demo_4_tiprack_300ul").unwrap().unwrap();

    assert_eq!(stored, imported);
    assert_eq!(stored.z_dimension, 64.49);
    let order: Vec<&str> = stored.wells.iter().map(|w| w.address.as_str()).collect();
    assert_eq!(order, ["A1", "B1", "A2", "B2"]);
    let b1 = stored.well("B1").unwrap();
    assert_eq!((b1.offset.x, b1.offset.y, b1.offset.z), (14.38, 65.24, 5.19));
}

#[test]
fn rectangular_wells_without_ordering_use_address_order() {
    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());

    let imported = service.import_opentrons(RESERVOIR).unwrap();

    let order: Vec<&str> = imported.wells.iter().map(|w| w.address.as_str()).collect();
    assert_eq!(order, ["A1", "A2"]);
    assert_eq!(imported.wells[0].diameter, 8.33);
}

#[test]
fn importing_twice_reports_existing_labware() {
    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());
    service.import_opentrons(TIPRACK).unwrap();

    let err = service.import_opentrons(TIPRACK).unwrap_err();
    assert!(matches!(
        err,
        LabwareImportServiceError::Repo(RepoError::AlreadyExists { .. })
    ));
}

#[test]
fn ordering_with_unknown_well_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());
    let broken = TIPRACK.replace(r#"["A2", "B2"]"#, r#"["A2", "B2", "C2"]"#);

    let err = service.import_opentrons(&broken).unwrap_err();
    assert!(matches!(
        err,
        LabwareImportServiceError::Import(LabwareImportError::UnknownOrderedWell(ref address))
            if address == "C2"
    ));
    assert!(service.list_labware().unwrap().is_empty());
}

#[test]
fn seeding_a_directory_twice_imports_each_definition_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("reservoirs")).unwrap();
    fs::write(dir.path().join("tiprack.json"), TIPRACK).unwrap();
    fs::write(dir.path().join("reservoirs").join("reservoir.json"), RESERVOIR).unwrap();
    fs::write(dir.path().join("README.txt"), "not a definition").unwrap();

    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());

    let first = service.seed_defaults(dir.path()).unwrap();
    assert_eq!(first.imported, ["demo_2_reservoir", "demo_4_tiprack_300ul"]);
    assert!(first.skipped.is_empty());

    let second = service.seed_defaults(dir.path()).unwrap();
    assert!(second.imported.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(service.list_labware().unwrap().len(), 2);
}

#[test]
fn seeding_with_a_broken_definition_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a_tiprack.json"), TIPRACK).unwrap();
    fs::write(dir.path().join("b_broken.json"), "{\"wells\": ").unwrap();

    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());

    let err = service.seed_defaults(dir.path()).unwrap_err();
    assert!(matches!(
        err,
        LabwareImportServiceError::Definition { ref path, .. } if path.ends_with("b_broken.json")
    ));
    assert!(service.list_labware().unwrap().is_empty());
}
