use once_cell::sync::Lazy;
use protoschema_parse::{ast::ProtoFileElement, parse, Location};

pub(crate) const DESCRIPTOR_NAME: &str = "google/protobuf/descriptor.proto";

const DESCRIPTOR: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/protobuf/google/protobuf/descriptor.proto"
));

static DESCRIPTOR_FILE: Lazy<ProtoFileElement> = Lazy::new(|| {
    parse(Location::get(DESCRIPTOR_NAME), DESCRIPTOR).expect("invalid bundled descriptor.proto")
});

/// The parsed bundled `google/protobuf/descriptor.proto`.
pub(crate) fn descriptor_file() -> &'static ProtoFileElement {
    &DESCRIPTOR_FILE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_parses() {
        let file = descriptor_file();
        assert_eq!(file.package_name.as_deref(), Some("google.protobuf"));
        assert!(file.types.iter().any(|ty| ty.name() == "FieldOptions"));
    }
}
