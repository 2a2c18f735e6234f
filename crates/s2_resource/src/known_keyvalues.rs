//! Names of well known entity keys, recovered from their murmur2 hashes.
//!
//! Entity lumps store property keys as `murmur2(name, ENTITY_SEED)`. The lookup table is built on
//! first use and shared by every thread.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Seed used for entity property keys
pub const ENTITY_SEED: u32 = 0x31415926;

const KNOWN_KEYS: &[&str] = &[
    "angles",
    "classname",
    "origin",
    "scales",
    "targetname",
    "parentname",
    "model",
    "skin",
    "body",
    "bodygroups",
    "rendercolor",
    "renderamt",
    "rendermode",
    "renderfx",
    "disableshadows",
    "disablereceiveshadows",
    "fademindist",
    "fademaxdist",
    "fadescale",
    "spawnflags",
    "startdisabled",
    "solid",
    "hammeruniqueid",
    "target",
    "speed",
    "health",
    "damage",
    "radius",
    "color",
    "brightness",
    "brightnessscale",
    "range",
    "falloff",
    "attenuation1",
    "attenuation2",
    "innerconeangle",
    "outerconeangle",
    "castshadows",
    "shadowtexturewidth",
    "shadowtextureheight",
    "enabled",
    "directlight",
    "indirectlight",
    "bouncescale",
    "lightsourceradius",
    "skyname",
    "skyambientbounce",
    "skybouncescale",
    "fogcolor",
    "fogcolor2",
    "fogstart",
    "fogend",
    "fogmaxdensity",
    "fogenable",
    "message",
    "pitch",
    "volume",
    "soundname",
    "soundevent",
    "effect_name",
    "cpoint1",
    "start_active",
    "texture",
    "lightmapstatic",
    "lightgroup",
    "vscripts",
    "filtername",
    "damagefilter",
    "team",
    "teamnum",
    "wait",
    "delay",
    "onplayerspawn",
    "world_maxs",
    "world_mins",
    "baked_light_indexing",
    "max_occluded_distance",
    "min_occluded_distance",
    "timeofday",
];

/// MurmurHash2 of `data`. An empty input hashes to 0 regardless of the seed.
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1e995;
    const R: u32 = 24;

    if data.is_empty() {
        return 0;
    }

    let mut hash = seed ^ data.len() as u32;
    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = LittleEndian::read_u32(chunk).wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        hash = hash.wrapping_mul(M) ^ k;
    }

    let tail = chunks.remainder();
    if tail.len() == 3 {
        hash ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        hash ^= (tail[1] as u32) << 8;
    }
    if let Some(&first) = tail.first() {
        hash ^= first as u32;
        hash = hash.wrapping_mul(M);
    }

    hash ^= hash >> 13;
    hash = hash.wrapping_mul(M);
    hash ^ (hash >> 15)
}

/// Hash of an entity key name
pub fn keyvalue_hash(name: &str) -> u32 {
    murmur2(name.as_bytes(), ENTITY_SEED)
}

fn known_keyvalues() -> &'static HashMap<u32, &'static str> {
    static KNOWN: OnceLock<HashMap<u32, &'static str>> = OnceLock::new();
    KNOWN.get_or_init(|| {
        let known: HashMap<_, _> = KNOWN_KEYS
            .iter()
            .map(|&name| (keyvalue_hash(name), name))
            .collect();
        tracing::trace!(count = known.len(), "built known keyvalue table");
        known
    })
}

/// Name of a well known entity key
pub fn hash_to_keyvalue(hash: u32) -> Option<&'static str> {
    known_keyvalues().get(&hash).copied()
}
