use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt;
use std::io::{Read, Seek};

use crate::{
    data::BlockContext,
    error::{Error, Result},
    stream::ResourceReadExt,
};

/// Container of the streamed sound data
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AudioFileType {
    Aac,
    #[default]
    Wav,
    Mp3,
}

impl AudioFileType {
    fn from_packed(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Aac),
            1 => Ok(Self::Wav),
            2 => Ok(Self::Mp3),
            other => Err(Error::UnknownSoundType(other)),
        }
    }
}

impl fmt::Display for AudioFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aac => "AAC",
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
        })
    }
}

/// Header of a compiled sound (`vsnd`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sound {
    pub sound_type: AudioFileType,
    pub sample_rate: u32,
    pub bits: u32,
    pub channels: u32,
    pub audio_format: u32,
    pub sample_size: u32,
    pub sample_count: u32,
    pub loop_start: i32,
    /// Length in seconds
    pub duration: f32,
    pub streaming_data_size: u32,
}

/// Extract `bits` bits of `value` starting at bit `offset`
fn bits(value: u32, offset: u32, bits: u32) -> u32 {
    (value >> offset) & ((1 << bits) - 1)
}

impl Sound {
    pub const LATEST_VERSION: u16 = 4;

    #[tracing::instrument(skip(reader))]
    pub fn read<R: Read + Seek>(reader: &mut R, context: &BlockContext<'_>) -> Result<Self> {
        if context.version > Self::LATEST_VERSION {
            return Err(Error::UnsupportedVersion {
                kind: "sound",
                found: context.version as u32,
                expected: Self::LATEST_VERSION as u32,
            });
        }

        reader.seek_to(context.offset)?;
        let mut sound = if context.version == Self::LATEST_VERSION {
            let sample_rate = reader.read_u16::<LittleEndian>()? as u32;
            let (sound_type, bits) = match reader.read_u16::<LittleEndian>()? {
                0x0101 => (AudioFileType::Wav, 8),
                0x0100 => (AudioFileType::Wav, 16),
                0x0200 => (AudioFileType::Wav, 32),
                0x0102 => (AudioFileType::Mp3, 16),
                0x0202 => (AudioFileType::Mp3, 32),
                other => return Err(Error::UnknownSoundType(other as u32)),
            };
            Self {
                sound_type,
                sample_rate,
                bits,
                sample_size: bits / 8,
                channels: 1,
                audio_format: 1,
                ..Default::default()
            }
        } else {
            let packed = reader.read_u32::<LittleEndian>()?;
            Self {
                sound_type: AudioFileType::from_packed(bits(packed, 0, 2))?,
                bits: bits(packed, 2, 5),
                channels: bits(packed, 7, 2),
                sample_size: bits(packed, 9, 3),
                audio_format: bits(packed, 12, 2),
                sample_rate: bits(packed, 14, 17),
                ..Default::default()
            }
        };

        sound.loop_start = reader.read_i32::<LittleEndian>()?;
        sound.sample_count = reader.read_u32::<LittleEndian>()?;
        sound.duration = reader.read_f32::<LittleEndian>()?;
        reader.skip(12)?;
        sound.streaming_data_size = reader.read_u32::<LittleEndian>()?;

        Ok(sound)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::data::sound::{AudioFileType, Sound};
    use crate::data::BlockContext;
    use crate::error::{Error, Result};
    use crate::test_util::Bytes;

    fn tail(b: &mut Bytes) {
        b.i32(-1).u32(44100).f32(1.0).zeros(12).u32(2048);
    }

    #[test]
    fn version4_type_table() -> Result<()> {
        let mut b = Bytes::default();
        b.u16(22050).u16(0x0202);
        tail(&mut b);

        let context = BlockContext {
            version: 4,
            ..Default::default()
        };
        let sound = Sound::read(&mut b.cursor(), &context)?;

        assert_eq!(
            sound,
            Sound {
                sound_type: AudioFileType::Mp3,
                sample_rate: 22050,
                bits: 32,
                channels: 1,
                audio_format: 1,
                sample_size: 4,
                sample_count: 44100,
                loop_start: -1,
                duration: 1.0,
                streaming_data_size: 2048,
            }
        );

        Ok(())
    }

    #[test]
    fn packed_info() -> Result<()> {
        // mp3, 16 bits, 2 channels, sample size 4, format 1, 48000 Hz
        let packed = 2 | (16 << 2) | (2 << 7) | (4 << 9) | (1 << 12) | (48000 << 14);
        let mut b = Bytes::default();
        b.u32(packed);
        tail(&mut b);

        let context = BlockContext {
            version: 1,
            ..Default::default()
        };
        let sound = Sound::read(&mut b.cursor(), &context)?;

        assert_eq!(sound.sound_type, AudioFileType::Mp3);
        assert_eq!(sound.bits, 16);
        assert_eq!(sound.channels, 2);
        assert_eq!(sound.sample_size, 4);
        assert_eq!(sound.audio_format, 1);
        assert_eq!(sound.sample_rate, 48000);
        assert_eq!(sound.streaming_data_size, 2048);

        Ok(())
    }

    #[test]
    fn rejected_inputs() {
        let context = BlockContext {
            version: 5,
            ..Default::default()
        };
        assert!(matches!(
            Sound::read(&mut Bytes::default().cursor(), &context),
            Err(Error::UnsupportedVersion { found: 5, .. })
        ));

        let mut b = Bytes::default();
        b.u32(3);
        tail(&mut b);
        let context = BlockContext {
            version: 2,
            ..Default::default()
        };
        assert!(matches!(
            Sound::read(&mut b.cursor(), &context),
            Err(Error::UnknownSoundType(3))
        ));
    }
}
