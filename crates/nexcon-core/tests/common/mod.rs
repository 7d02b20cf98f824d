use nexcon_core::{Component, Instrument, Transform, Vector3};

/// Instrument with `/entry/instrument/detector` depending on `rotation_1`
/// (90 degrees about z, at the origin)
#[allow(dead_code)]
pub fn detector_with_rotation() -> (Instrument, Component, Transform) {
    let mut instrument = Instrument::new();
    let detector = instrument
        .create_component("detector", "NXdetector", "")
        .unwrap();
    let rotation = detector
        .add_rotation(
            &mut instrument,
            Vector3::new(0.0, 0.0, 1.0),
            90.0,
            None,
            None,
        )
        .unwrap();
    detector
        .set_depends_on(&mut instrument, Some(rotation))
        .unwrap();
    (instrument, detector, rotation)
}

/// Wire form of every stored depends_on value, keyed by owner path
#[allow(dead_code)]
pub fn depends_on_values(instrument: &Instrument) -> Vec<(String, String)> {
    nexcon_core::rules::invariants::depends_on_owners(instrument)
        .into_iter()
        .map(|owner| {
            let path = instrument.store().absolute_path(owner).unwrap();
            let reference =
                nexcon_core::ops::depends_on_ops::stored_reference(instrument, owner).unwrap();
            let wire = instrument.store().wire_form(&reference).unwrap();
            (path, wire)
        })
        .collect()
}

/// Paths of a chain, nearest first
#[allow(dead_code)]
pub fn chain_paths(instrument: &Instrument, chain: &[Transform]) -> Vec<String> {
    chain
        .iter()
        .map(|t| t.absolute_path(instrument).unwrap())
        .collect()
}
