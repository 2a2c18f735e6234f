use std::io::Cursor;
use std::sync::Arc;

use s2_resource::data::{ResourceData, TextureFormat};
use s2_resource::error::{Error, Result};
use s2_resource::kv3::{guid, MAGIC};
use s2_resource::resource::{AssetLoader, FileSystemLoader};
use s2_resource::{BlockType, Resource, ResourceOptions, ResourceType};
use tracing_test::traced_test;

/// Little endian writer with support for self-relative offset fields
#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, value: u8) -> &mut Self {
        self.0.push(value);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.0.extend_from_slice(value);
        self
    }

    fn cstring(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes()).u8(0)
    }

    fn offset(&mut self) -> usize {
        let at = self.0.len();
        self.u32(0);
        at
    }

    fn point(&mut self, at: usize) -> &mut Self {
        let relative = (self.0.len() - at) as u32;
        self.0[at..at + 4].copy_from_slice(&relative.to_le_bytes());
        self
    }
}

fn resource(version: u16, blocks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut w = Writer::default();
    w.u32(0).u16(12).u16(version).u32(8).u32(blocks.len() as u32);

    let mut entries = Vec::new();
    for (tag, data) in blocks {
        w.bytes(&tag[..]);
        entries.push(w.offset());
        w.u32(data.len() as u32);
    }
    for ((_, data), entry) in blocks.iter().zip(entries) {
        w.point(entry).bytes(data);
    }

    let size = w.0.len() as u32;
    w.0[..4].copy_from_slice(&size.to_le_bytes());
    w.0
}

fn edit_info(compiler_identifier: &str, string: &str) -> Vec<u8> {
    let mut w = Writer::default();
    let headers: Vec<usize> = (0..10)
        .map(|_| {
            let at = w.offset();
            w.u32(0);
            at
        })
        .collect();
    w.0[headers[3] + 4] = 1;

    w.point(headers[3]);
    let string_offset = w.offset();
    let identifier_offset = w.offset();
    w.u32(0).u32(0);
    w.point(string_offset).cstring(string);
    w.point(identifier_offset).cstring(compiler_identifier);
    w.0
}

/// Legacy uncompressed KV3 with string properties only
fn kv3(properties: &[(&str, &str)]) -> Vec<u8> {
    let mut w = Writer::default();
    w.u32(MAGIC)
        .bytes(&guid::UNCOMPRESSED)
        .bytes(&guid::FORMAT_GENERIC)
        .u32(properties.len() as u32 * 2);
    for (key, value) in properties {
        w.cstring(key).cstring(value);
    }

    w.u8(9).i32(properties.len() as i32);
    for index in 0..properties.len() as i32 {
        w.i32(index * 2).u8(6).i32(index * 2 + 1);
    }
    w.0
}

fn read(file: Vec<u8>, options: ResourceOptions) -> Result<Resource> {
    Resource::from_reader(&mut Cursor::new(file), options)
}

#[traced_test]
#[test]
fn texture_resource() -> Result<()> {
    let mut texture = Writer::default();
    texture
        .u16(1)
        .u16(0)
        .f32(0.25)
        .f32(0.25)
        .f32(0.25)
        .f32(1.0)
        .u16(4)
        .u16(4)
        .u16(1)
        .u8(4)
        .u8(1)
        .u32(0)
        .u32(0)
        .u32(0);

    let texels: Vec<u8> = (0..64).collect();
    let mut file = resource(
        1,
        &[
            (b"REDI", edit_info("CompileTexture", "")),
            (b"DATA", texture.0),
        ],
    );
    file.extend_from_slice(&texels);

    let mut reader = Cursor::new(file);
    let resource = Resource::from_reader(&mut reader, ResourceOptions::default())?;
    assert_eq!(resource.resource_type(), ResourceType::Texture);

    let Some(ResourceData::Texture(texture)) = resource.data() else {
        panic!("expected a texture, got {:?}", resource.data());
    };
    assert_eq!((texture.width, texture.height), (4, 4));
    assert_eq!(texture.format, TextureFormat::RGBA8888);
    assert_eq!(texture.read_mip(&mut reader, 0)?, texels);

    Ok(())
}

#[traced_test]
#[test]
fn panorama_checksum() -> Result<()> {
    let payload = b"<root><Panel/></root>";
    let panorama = |crc: u32| {
        let mut w = Writer::default();
        w.u32(crc).u16(1).cstring("file.xml").u32(0).u32(0).bytes(payload);
        w.0
    };
    let file = |crc: u32| {
        resource(
            0,
            &[
                (
                    b"REDI",
                    edit_info("CompilePanorama", "Panorama Layout Compiler Version"),
                ),
                (b"DATA", panorama(crc)),
            ],
        )
    };
    let options = ResourceOptions::builder().verify_checksums(true).build();

    let resource = read(file(0x7b71445f), options.clone())?;
    assert_eq!(resource.resource_type(), ResourceType::PanoramaLayout);
    let Some(ResourceData::Panorama(panorama)) = resource.data() else {
        panic!("expected panorama data");
    };
    assert_eq!(panorama.names[0].name, "file.xml");
    assert_eq!(panorama.text(), "<root><Panel/></root>");

    assert!(matches!(
        read(file(1), options),
        Err(Error::ChecksumMismatch { stored: 1, computed: 0x7b71445f })
    ));
    assert!(read(file(1), ResourceOptions::default()).is_ok());

    Ok(())
}

#[traced_test]
#[test]
fn material_resource() -> Result<()> {
    let data = kv3(&[
        ("m_materialName", "materials/floor.vmat"),
        ("m_shaderName", "vr_simple.vfx"),
    ]);
    let file = resource(
        0,
        &[(b"REDI", edit_info("CompileMaterial", "")), (b"DATA", data)],
    );

    let resource = read(file, ResourceOptions::default())?;
    assert_eq!(resource.resource_type(), ResourceType::Material);
    let Some(ResourceData::Material(material)) = resource.data() else {
        panic!("expected a material");
    };
    assert_eq!(material.name, "materials/floor.vmat");
    assert_eq!(material.shader_name, "vr_simple.vfx");

    Ok(())
}

#[traced_test]
#[test]
fn untyped_kv3_data_is_detected() -> Result<()> {
    let file = resource(0, &[(b"DATA", kv3(&[("m_name", "thing")]))]);

    let resource = read(file, ResourceOptions::default())?;
    assert_eq!(resource.resource_type(), ResourceType::Unknown);

    let collection = resource.data().and_then(ResourceData::collection);
    assert_eq!(
        collection.and_then(|c| c.find_value::<String>("m_name")),
        Some("thing".to_string())
    );
    assert!(resource.find_block(BlockType::DATA).is_some());

    Ok(())
}

#[traced_test]
#[test]
fn nested_resources_from_disk() -> Result<()> {
    let root = std::env::temp_dir().join(format!("s2_resource_{}", std::process::id()));
    std::fs::create_dir_all(root.join("materials"))?;
    std::fs::write(
        root.join("materials/floor.vmat_c"),
        resource(
            0,
            &[
                (b"REDI", edit_info("CompileMaterial", "")),
                (b"DATA", kv3(&[("m_materialName", "materials/floor.vmat")])),
            ],
        ),
    )?;

    let loader = FileSystemLoader::new(&root);
    assert!(matches!(
        loader.open("materials/missing.vmat"),
        Err(Error::AssetNotFound(_))
    ));

    let options = ResourceOptions::builder()
        .loader(Arc::new(loader))
        .build();
    let parent = Resource::new(options);
    let material = parent.load_resource("materials/floor.vmat")?;
    assert_eq!(material.resource_type(), ResourceType::Material);
    assert_eq!(material.depth(), 1);

    std::fs::remove_dir_all(&root)?;
    Ok(())
}
