#![cfg(not(feature = "file-output"))]
mod util;

use reservoir_export::prelude::*;
use util::FieldSim;

#[test]
fn every_entry_point_reports_the_missing_capability() {
    let mut writer = ExportWriter::initialize(
        ExportConfig::default(),
        CollectToIoRank::serial(4),
        StandardOutputModule::new(PhysicalConfig::default()),
        util::uniform_topology(2, 2, 1, 1.0),
        None,
    )
    .unwrap();
    let sim = FieldSim::serial(4, 0);
    let expected = ExportError::BackendUnavailable("file-output");
    assert_eq!(writer.write_init(), Err(expected.clone()));
    assert_eq!(writer.write_step(&sim, util::step(1.0)), Err(expected.clone()));
    assert_eq!(writer.begin_restart(&sim).unwrap_err(), expected);
}
