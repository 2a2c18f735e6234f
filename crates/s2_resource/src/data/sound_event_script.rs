use indexmap::IndexMap;
use std::io::{Read, Seek};

use crate::{
    data::BlockContext,
    error::{Error, Result},
    ntro::{NtroReader, NtroStruct},
    value::KeyValueCollection,
};

/// A compiled sound event script (`vsndevts`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundEventScript {
    /// Event name to the operator stack source of that event
    pub values: IndexMap<String, String>,
    pub data: NtroStruct,
}

impl SoundEventScript {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &BlockContext<'_>) -> Result<Self> {
        let data = match context.manifest {
            Some(manifest) => NtroReader::new(manifest, context.references).read_block(
                reader,
                context.offset,
                "",
            )?,
            None => NtroStruct::default(),
        };

        let mut values = IndexMap::new();
        let root = KeyValueCollection::from(&data);
        for event in root.find_array_values::<KeyValueCollection>("m_SoundEvents") {
            let name = event
                .find_value::<String>("m_SoundName")
                .ok_or_else(|| Error::FieldNotFound("m_SoundName".to_string()))?;
            let operators = event
                .find_value::<String>("m_OperatorsKV")
                .ok_or_else(|| Error::FieldNotFound("m_OperatorsKV".to_string()))?;
            values.insert(name, operators);
        }

        Ok(Self { values, data })
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::data::{BlockContext, SoundEventScript};
    use crate::error::{Error, Result};
    use crate::manifest::{DiskField, DiskStruct, IntrospectionManifest};
    use crate::test_util::Bytes;
    use crate::types::DataType;

    fn field(name: &str, disk_offset: u16, data_type: DataType) -> DiskField {
        DiskField {
            name: name.to_string(),
            disk_offset,
            type_code: data_type as i16,
            ..Default::default()
        }
    }

    fn manifest(event_fields: Vec<DiskField>) -> IntrospectionManifest {
        let mut events = field("m_SoundEvents", 0, DataType::Struct);
        events.indirections = vec![0x04];
        events.type_data = 2;

        IntrospectionManifest {
            introspection_version: 4,
            structs: vec![
                DiskStruct {
                    id: 1,
                    name: "VSoundEventScript_t".to_string(),
                    disk_size: 8,
                    fields: vec![events],
                    ..Default::default()
                },
                DiskStruct {
                    id: 2,
                    name: "VSoundEvent_t".to_string(),
                    disk_size: 8,
                    fields: event_fields,
                    ..Default::default()
                },
            ],
            enums: Vec::new(),
        }
    }

    fn script() -> Bytes {
        let mut b = Bytes::default();
        let events = b.offset();
        b.u32(1);
        b.point(events);
        let name = b.offset();
        let operators = b.offset();
        b.point(name).cstring("ui.click");
        b.point(operators).cstring("{ volume = 1.0 }");
        b
    }

    #[test]
    fn events_map_to_operators() -> Result<()> {
        let b = script();
        let manifest = manifest(vec![
            field("m_SoundName", 0, DataType::String),
            field("m_OperatorsKV", 4, DataType::String),
        ]);
        let context = BlockContext {
            size: b.pos() as u32,
            manifest: Some(&manifest),
            ..Default::default()
        };

        let script = SoundEventScript::read(&mut b.cursor(), &context)?;

        assert_eq!(
            script.values.get("ui.click").map(String::as_str),
            Some("{ volume = 1.0 }")
        );
        assert_eq!(script.data.name, "VSoundEventScript_t");

        Ok(())
    }

    #[test]
    fn missing_operators_field() {
        let b = script();
        let manifest = manifest(vec![field("m_SoundName", 0, DataType::String)]);
        let context = BlockContext {
            size: b.pos() as u32,
            manifest: Some(&manifest),
            ..Default::default()
        };

        assert!(matches!(
            SoundEventScript::read(&mut b.cursor(), &context),
            Err(Error::FieldNotFound(name)) if name == "m_OperatorsKV"
        ));
    }
}
