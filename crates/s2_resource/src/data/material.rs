use indexmap::IndexMap;
use std::io::{Read, Seek};

use crate::{
    data::{BlockContext, KeyValueData},
    error::Result,
    value::{FromValue, KeyValueCollection, Vector4},
};

/// A compiled material (`vmat`)
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader_name: String,

    pub int_params: IndexMap<String, i64>,
    pub float_params: IndexMap<String, f32>,
    pub vector_params: IndexMap<String, Vector4>,
    pub texture_params: IndexMap<String, String>,

    pub int_attributes: IndexMap<String, i64>,
    pub float_attributes: IndexMap<String, f32>,
    pub vector_attributes: IndexMap<String, Vector4>,
    pub string_attributes: IndexMap<String, String>,

    /// The decoded tree the fields above were taken from
    pub data: KeyValueData,
}

/// Collect `name -> value` pairs from the parameter array `array`. The first entry for a name wins.
fn parameters<'a, T>(data: KeyValueCollection<'a>, array: &str, key: &str) -> IndexMap<String, T>
where
    T: FromValue<'a> + Default,
{
    let mut output = IndexMap::new();
    for parameter in data.find_array_values::<KeyValueCollection>(array) {
        let name = parameter.find_value_or::<String>("m_name", String::new());
        let value = parameter.find_value_or(key, T::default());
        output.entry(name).or_insert(value);
    }
    output
}

impl Material {
    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &BlockContext<'_>) -> Result<Self> {
        let data = KeyValueData::read(reader, context, "")?;
        let collection = data.collection();

        Ok(Self {
            name: collection.find_value_or("m_materialName", String::new()),
            shader_name: collection.find_value_or("m_shaderName", String::new()),
            int_params: parameters(collection, "m_intParams", "m_nValue"),
            float_params: parameters(collection, "m_floatParams", "m_flValue"),
            vector_params: parameters(collection, "m_vectorParams", "m_value"),
            texture_params: parameters(collection, "m_textureParams", "m_pValue"),
            int_attributes: parameters(collection, "m_intAttributes", "m_nValue"),
            float_attributes: parameters(collection, "m_floatAttributes", "m_flValue"),
            vector_attributes: parameters(collection, "m_vectorAttributes", "m_value"),
            string_attributes: parameters(collection, "m_stringAttributes", "m_pValue"),
            data,
        })
    }
}
