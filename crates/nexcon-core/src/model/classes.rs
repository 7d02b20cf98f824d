//! NeXus class names and the attribute/field names the model relies on

pub const NX_ENTRY: &str = "NXentry";
pub const NX_INSTRUMENT: &str = "NXinstrument";
pub const NX_SAMPLE: &str = "NXsample";
pub const NX_TRANSFORMATIONS: &str = "NXtransformations";
/// Group whose datasets configure one data stream for the writer
pub const NC_STREAM: &str = "NCstream";

pub const DEPENDS_ON: &str = "depends_on";
pub const TRANSFORMATION_TYPE: &str = "transformation_type";
pub const VECTOR: &str = "vector";
pub const UNITS: &str = "units";
pub const DESCRIPTION: &str = "description";
/// Attribute marking a group as a link to another path
pub const LINK_TARGET: &str = "link_target";

/// Name given to a component's transformations group when it is created
pub const TRANSFORMATIONS_GROUP_NAME: &str = "transformations";

/// Classes recognised as instrument components
pub const COMPONENT_CLASSES: &[&str] = &[
    "NXaperture",
    "NXattenuator",
    "NXbeam_stop",
    "NXbending_magnet",
    "NXcollimator",
    "NXcrystal",
    "NXdetector",
    "NXdisk_chopper",
    "NXfermi_chopper",
    "NXfilter",
    "NXguide",
    "NXinsertion_device",
    "NXmirror",
    "NXmoderator",
    "NXmonitor",
    "NXpolarizer",
    "NXpositioner",
    "NXsample",
    "NXslit",
    "NXsource",
    "NXvelocity_selector",
];

/// Classes created directly under the entry instead of the instrument group
pub const COMPONENTS_IN_ENTRY: &[&str] = &["NXmonitor", "NXsample"];

pub fn is_component_class(nx_class: &str) -> bool {
    COMPONENT_CLASSES.contains(&nx_class)
}

pub fn belongs_in_entry(nx_class: &str) -> bool {
    COMPONENTS_IN_ENTRY.contains(&nx_class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_classes_are_components() {
        for class in COMPONENTS_IN_ENTRY {
            assert!(is_component_class(class));
        }
    }

    #[test]
    fn test_routing() {
        assert!(belongs_in_entry("NXsample"));
        assert!(belongs_in_entry("NXmonitor"));
        assert!(!belongs_in_entry("NXdetector"));
        assert!(!is_component_class(NX_TRANSFORMATIONS));
    }
}
