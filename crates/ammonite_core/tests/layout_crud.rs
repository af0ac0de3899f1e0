use ammonite_core::db::open_db_in_memory;
use ammonite_core::{
    DeckCalibration, DeckRepository, DeckService, EntityKind, EntityValidationError, Labware,
    LabwareRepository, LabwareService, Location, NewDeck, RepoError, SqliteDeckRepository,
    SqliteLabwareRepository, Well,
};
use glam::{DQuat, DVec3};

fn well(address: &str, x: f64, y: f64) -> Well {
    Well {
        address: address.to_string(),
        depth: 10.5,
        diameter: 6.4,
        offset: DVec3::new(x, y, 0.92),
    }
}

fn plate() -> Labware {
    Labware::new(
        "plate",
        14.22,
        vec![well("A1", 14.38, 74.24), well("B1", 14.38, 65.24), well("A2", 23.38, 74.24)],
    )
}

#[test]
fn labware_roundtrip_preserves_well_order() {
    let conn = open_db_in_memory().unwrap();
    let service = LabwareService::new(SqliteLabwareRepository::try_new(&conn).unwrap());

    service.create_labware(&plate()).unwrap();
    let loaded = service.get_labware("plate").unwrap().unwrap();

    assert_eq!(loaded, plate());
    let addresses: Vec<&str> = loaded.wells.iter().map(|w| w.address.as_str()).collect();
    assert_eq!(addresses, ["A1", "B1", "A2"]);
}

#[test]
fn duplicate_labware_name_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLabwareRepository::try_new(&conn).unwrap();
    repo.create_labware(&plate()).unwrap();

    let err = repo.create_labware(&plate()).unwrap_err();
    assert!(matches!(
        err,
        RepoError::AlreadyExists {
            kind: EntityKind::Labware,
            ..
        }
    ));
}

#[test]
fn invalid_labware_is_not_persisted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLabwareRepository::try_new(&conn).unwrap();
    let mut broken = plate();
    broken.wells.push(well("A1", 0.0, 0.0));

    let err = repo.create_labware(&broken).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::DuplicateChild { .. })
    ));
    assert!(repo.get_labware("plate").unwrap().is_none());
    let wells: i64 = conn
        .query_row("SELECT COUNT(*) FROM well;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(wells, 0);
}

#[test]
fn deleting_labware_cascades_to_wells() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteLabwareRepository::try_new(&conn).unwrap();
    repo.create_labware(&plate()).unwrap();

    repo.delete_labware("plate").unwrap();

    let wells: i64 = conn
        .query_row("SELECT COUNT(*) FROM well;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(wells, 0);
    assert!(matches!(
        repo.delete_labware("plate").unwrap_err(),
        RepoError::NotFound { .. }
    ));
}

#[test]
fn new_deck_is_uncalibrated_until_calibrated() {
    let conn = open_db_in_memory().unwrap();
    let service = DeckService::new(SqliteDeckRepository::try_new(&conn).unwrap());
    service
        .create_deck(&NewDeck::new(
            "deck",
            vec![
                Location::new("1", DVec3::ZERO),
                Location::new("2", DVec3::new(132.5, 0.0, 0.0)),
            ],
        ))
        .unwrap();

    let deck = service.get_deck("deck").unwrap().unwrap();
    assert!(!deck.is_calibrated());
    assert_eq!(deck.locations.len(), 2);

    let calibration = DeckCalibration::new(DVec3::new(132.0, 158.0, 121.0), DQuat::IDENTITY);
    service.calibrate("deck", &calibration).unwrap();
    let deck = service.get_deck("deck").unwrap().unwrap();
    assert_eq!(deck.calibration, Some(calibration));

    let moved = DeckCalibration::new(DVec3::new(130.0, 150.0, 120.0), DQuat::IDENTITY);
    service.calibrate("deck", &moved).unwrap();
    assert_eq!(
        service.get_deck("deck").unwrap().unwrap().calibration,
        Some(moved)
    );
}

#[test]
fn calibrating_missing_deck_fails() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeckRepository::try_new(&conn).unwrap();

    let err = repo
        .set_deck_calibration("ghost", &DeckCalibration::new(DVec3::ZERO, DQuat::IDENTITY))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            kind: EntityKind::Deck,
            ..
        }
    ));
}

#[test]
fn non_unit_calibration_rotation_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeckRepository::try_new(&conn).unwrap();
    repo.create_deck(&NewDeck::new("deck", vec![])).unwrap();

    let skewed = DeckCalibration::from_components(0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0);
    let err = repo.set_deck_calibration("deck", &skewed).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(EntityValidationError::NonUnitRotation { .. })
    ));
    assert!(!repo.get_deck("deck").unwrap().unwrap().is_calibrated());
}

#[test]
fn location_orientation_roundtrips_and_zero_reads_as_inherited() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeckRepository::try_new(&conn).unwrap();
    let tilted = DQuat::from_xyzw(1.0, 0.0, 0.0, 0.0);
    repo.create_deck(&NewDeck::new(
        "deck",
        vec![
            Location::new("1", DVec3::ZERO).with_orientation(tilted),
            Location::new("2", DVec3::ZERO),
        ],
    ))
    .unwrap();
    conn.execute(
        "INSERT INTO location (deck, name, x, y, z, qw, qx, qy, qz)
         VALUES ('deck', '3', 0, 0, 0, 0, 0, 0, 0);",
        [],
    )
    .unwrap();

    let deck = repo.get_deck("deck").unwrap().unwrap();
    assert_eq!(deck.location("1").unwrap().orientation, Some(tilted));
    assert_eq!(deck.location("2").unwrap().orientation, None);
    assert_eq!(deck.location("3").unwrap().orientation, None);
}

#[test]
fn deleting_deck_cascades_to_locations() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteDeckRepository::try_new(&conn).unwrap();
    repo.create_deck(&NewDeck::new("deck", vec![Location::new("1", DVec3::ZERO)]))
        .unwrap();
    repo.create_deck(&NewDeck::new("spare", vec![])).unwrap();

    repo.delete_deck("deck").unwrap();

    let locations: i64 = conn
        .query_row("SELECT COUNT(*) FROM location;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(locations, 0);
    let names: Vec<String> = repo.list_decks().unwrap().into_iter().map(|d| d.name).collect();
    assert_eq!(names, ["spare"]);
}
