//! Error classification for broken inputs and misuse.

use std::io::Cursor;

use tempfile::TempDir;
use vfx_imf::convert::floats_to_bytes;
use vfx_imf::{
    ChannelLayout, Compression, Error, FrameBuffer, Header, InputFile, OutputFile, PixelType,
    ReadOptions, TileDescription, WriteOptions,
};

fn gray(width: u32, height: u32) -> Header {
    let mut header = Header::new(width, height);
    header.set_channels(ChannelLayout::uniform(&["Y"], PixelType::Float).unwrap());
    header
}

#[test]
fn missing_input_is_io() {
    let dir = TempDir::new().unwrap();
    let err = InputFile::open(dir.path().join("does-not-exist.exr")).err().unwrap();
    assert!(err.is_io_error(), "{err}");
}

#[test]
fn unwritable_output_is_io() {
    let err = OutputFile::create("/nonexistent-dir/x.exr", &gray(2, 2)).err().unwrap();
    assert!(err.is_io_error(), "{err}");
}

#[test]
fn half_written_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("half.exr");

    let mut file = OutputFile::create(&path, &gray(10, 100)).unwrap();
    let rows = floats_to_bytes(&[0.5; 10 * 50]);
    file.write_pixels(&FrameBuffer::new().with("Y", &rows), 50).unwrap();
    assert_eq!(file.rows_written(), 50);
    let err = file.close().unwrap_err();
    assert!(err.is_contract_violation(), "{err}");
    drop(file);

    let err = InputFile::open(&path).err().unwrap();
    assert!(err.is_format_error(), "{err}");
}

#[test]
fn empty_image_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.exr");

    // dropped without close: the drop closes, fails and leaves the table empty
    drop(OutputFile::create(&path, &gray(4, 10)).unwrap());
    assert!(InputFile::open(&path).err().unwrap().is_format_error());

    let mut file = OutputFile::create(&path, &gray(4, 10)).unwrap();
    assert!(file.close().unwrap_err().is_contract_violation());
    assert!(InputFile::open(&path).err().unwrap().is_format_error());
}

#[test]
fn wrong_attribute_type() {
    let mut header = gray(2, 2);
    header.set("frames", 24).unwrap();
    assert!(header.get_as::<f32>("frames").unwrap_err().is_type_error());
    assert!(header.get_as::<i32>("nothing").unwrap_err().is_not_found());

    // a mandatory attribute of the wrong type stops the writer
    header.set("compression", 3).unwrap();
    let err = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default())
        .err()
        .unwrap();
    assert!(err.is_type_error(), "{err}");
}

#[test]
fn missing_mandatory_attribute() {
    let mut header = gray(2, 2);
    header.remove("lineOrder");
    let err = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default())
        .err()
        .unwrap();
    assert!(err.is_contract_violation(), "{err}");
}

#[test]
fn unsupported_layouts() {
    let mut header = gray(8, 8);
    let mut tiles = TileDescription::new(4, 4);
    tiles.mode = vfx_imf::LevelMode::MipmapLevels;
    header.set_tile_description(tiles);
    let err = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Unsupported(_)), "{err}");

    let mut header = gray(8, 8);
    header.set_text("type", "deepscanline").unwrap();
    let err = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Unsupported(_)), "{err}");
}

#[test]
fn corrupted_bytes_are_format_errors() {
    let mut header = gray(6, 40);
    header.set_compression(Compression::Zip);
    let values: Vec<f32> = (0..240).map(|i| (i % 5) as f32).collect();
    let data = floats_to_bytes(&values);
    let mut out = OutputFile::from_writer(Cursor::new(Vec::new()), &header, WriteOptions::default()).unwrap();
    out.write_pixels(&FrameBuffer::new().with("Y", &data), 40).unwrap();
    let bytes = out.into_inner().unwrap().into_inner();

    // wrong version
    let mut bad = bytes.clone();
    bad[4] = 3;
    let err = InputFile::from_reader(Cursor::new(bad), ReadOptions::default()).err().unwrap();
    assert!(err.is_format_error(), "{err}");

    // cut inside the last chunk: its offset is still valid, its data is not
    let cut = bytes[..bytes.len() - 10].to_vec();
    let mut file = InputFile::from_reader(Cursor::new(cut), ReadOptions::default()).unwrap();
    assert!(file.read_channel("Y", None, Some(0..=15)).is_ok());
    assert!(file.channel("Y").unwrap_err().is_format_error());

    // garbage in the last chunk's payload
    let mut garbled = bytes.clone();
    let len = garbled.len();
    for byte in &mut garbled[len - 20..] {
        *byte = 0xff;
    }
    let mut file = InputFile::from_reader(Cursor::new(garbled), ReadOptions::default()).unwrap();
    assert!(file.channel("Y").unwrap_err().is_format_error());
}
