//! Write-then-read tests over real files.

use approx::assert_relative_eq;
use half::f16;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tempfile::TempDir;
use vfx_imf::convert::{
    bytes_to_floats, bytes_to_halves, bytes_to_uints, floats_to_bytes, halves_to_bytes, uints_to_bytes,
};
use vfx_imf::{
    AttributeValue, Box2i, Channel, ChannelLayout, Chromaticities, Compression, FrameBuffer, Header,
    InputFile, KeyCode, LineOrder, M44f, OutputFile, PixelType, Preview, Rational, Text,
    TileDescription, TimeCode, V2, V2f, V3i,
};

fn random_bytes(rng: &mut StdRng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.r#gen::<u8>()).collect()
}

fn random_halves(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let values: Vec<f16> = (0..len).map(|_| f16::from_f32(rng.gen_range(-4.0..4.0))).collect();
    halves_to_bytes(&values)
}

/// Writes one plane per channel, split into calls of `rows_per_call` rows.
fn write_file(path: &std::path::Path, header: &Header, planes: &[(&str, Vec<u8>)], rows_per_call: usize) {
    let layout = header.channels().unwrap().clone();
    let window = header.data_window().unwrap();
    let height = window.height() as usize;
    let mut file = OutputFile::create(path, header).unwrap();

    let mut y = window.min.y;
    let mut written = 0;
    while written < height {
        let rows = rows_per_call.min(height - written);
        let (lo, hi) = (y, y + rows as i32 - 1);
        let mut frame = FrameBuffer::new();
        for (name, data) in planes {
            let channel = layout.get(name).unwrap();
            let row_bytes = channel.bytes_per_row(&window);
            let skip = channel.stored_rows(window.min.y, lo - 1) * row_bytes;
            let take = channel.stored_rows(lo, hi) * row_bytes;
            frame.insert(*name, &data[skip..skip + take]);
        }
        file.write_pixels(&frame, rows).unwrap();
        y += rows as i32;
        written += rows;
    }
    file.close().unwrap();
}

#[test]
fn rgb_float_roundtrip_through_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rgb.exr");
    let mut rng = StdRng::seed_from_u64(1);

    let header = Header::new(33, 21);
    let planes: Vec<(&str, Vec<u8>)> = ["R", "G", "B"]
        .into_iter()
        .map(|name| {
            let values: Vec<f32> = (0..33 * 21).map(|_| rng.r#gen::<f32>()).collect();
            (name, floats_to_bytes(&values))
        })
        .collect();
    write_file(&path, &header, &planes, 21);

    let mut file = InputFile::open(&path).unwrap();
    assert_eq!(file.header().data_window().unwrap(), Box2i::from_size(33, 21));
    for (name, data) in &planes {
        assert_eq!(&file.channel(name).unwrap(), data, "channel {name}");
    }
}

#[test]
fn uint_float_conversion() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ids.exr");

    let mut header = Header::new(4, 1);
    let mut layout = ChannelLayout::new();
    layout.insert("id", Channel::new(PixelType::Uint)).unwrap();
    layout.insert("depth", Channel::new(PixelType::Float)).unwrap();
    header.set_channels(layout);

    let ids = uints_to_bytes(&[0, 1, 33, 79218]);
    let depth = floats_to_bytes(&[0.0, 1.0, 33.0, 79218.0]);
    write_file(&path, &header, &[("id", ids.clone()), ("depth", depth.clone())], 1);

    let mut file = InputFile::open(&path).unwrap();
    assert_eq!(
        bytes_to_floats(&file.channel_as("id", PixelType::Float).unwrap()),
        [0.0, 1.0, 33.0, 79218.0]
    );
    assert_eq!(
        bytes_to_uints(&file.channel_as("depth", PixelType::Uint).unwrap()),
        [0, 1, 33, 79218]
    );
    assert_eq!(file.channel("id").unwrap(), ids);
}

#[test]
fn size_law_across_types() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("size.exr");
    let mut rng = StdRng::seed_from_u64(2);

    let mut header = Header::new(17, 9);
    header.set_channels(ChannelLayout::uniform(&["Y"], PixelType::Half).unwrap());
    write_file(&path, &header, &[("Y", random_halves(&mut rng, 17 * 9))], 4);

    let mut file = InputFile::open(&path).unwrap();
    let half = file.channel_as("Y", PixelType::Half).unwrap();
    let float = file.channel_as("Y", PixelType::Float).unwrap();
    let uint = file.channel_as("Y", PixelType::Uint).unwrap();
    assert_eq!(half.len(), 17 * 9 * 2);
    assert_eq!(float.len(), 2 * half.len());
    assert_eq!(uint.len(), float.len());

    for (h, f) in bytes_to_halves(&half).iter().zip(bytes_to_floats(&float)) {
        assert_relative_eq!(h.to_f32(), f);
    }
}

#[test]
fn chunking_does_not_change_the_file() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(3);

    for compression in [Compression::None, Compression::Rle, Compression::Zips, Compression::Zip] {
        let mut header = Header::new(640, 480);
        header.set_channels(ChannelLayout::uniform(&["A", "B", "G", "R"], PixelType::Half).unwrap());
        header.set_compression(compression);
        let planes: Vec<(&str, Vec<u8>)> = ["A", "B", "G", "R"]
            .into_iter()
            .map(|name| (name, random_halves(&mut rng, 640 * 480)))
            .collect();

        let whole = dir.path().join("whole.exr");
        let pieces = dir.path().join("pieces.exr");
        write_file(&whole, &header, &planes, 480);
        write_file(&pieces, &header, &planes, 4);
        assert_eq!(
            std::fs::read(&whole).unwrap(),
            std::fs::read(&pieces).unwrap(),
            "{compression}"
        );
    }
}

#[test]
fn many_channels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("aovs.exr");
    let mut rng = StdRng::seed_from_u64(4);

    let names: Vec<String> = (0..40).map(|i| format!("aov{i:02}.value")).collect();
    let mut header = Header::new(12, 10);
    let mut layout = ChannelLayout::new();
    for (i, name) in names.iter().enumerate() {
        let pixel_type = PixelType::ALL[i % 3];
        layout.insert(name.as_str(), Channel::new(pixel_type)).unwrap();
    }
    header.set_channels(layout.clone());
    header.set_compression(Compression::Zips);

    let planes: Vec<(&str, Vec<u8>)> = layout
        .iter()
        .map(|(name, channel)| (name, random_bytes(&mut rng, 12 * 10 * channel.pixel_type.size())))
        .collect();
    write_file(&path, &header, &planes, 3);

    let mut file = InputFile::open(&path).unwrap();
    let all = file.channels(&names).unwrap();
    for (name, data) in names.iter().zip(&all) {
        let (_, expected) = planes.iter().find(|(n, _)| n == name).unwrap();
        assert_eq!(data, expected, "channel {name}");
    }
    // channels() matches channel() per name
    assert_eq!(file.channel(&names[7]).unwrap(), all[7]);
}

#[test]
fn header_attributes_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("attrs.exr");

    let mut header = Header::new(2, 2);
    let mut luma = Channel::new(PixelType::Half);
    luma.reserved = [1, 2, 3];
    let mut layout = ChannelLayout::new();
    layout.insert("Y", luma).unwrap();
    header.set_channels(layout);
    header.set_compression(Compression::Rle);
    header.set_display_window(Box2i::new(V2::new(-8, -8), V2::new(9, 9)));
    header.set_pixel_aspect_ratio(2.0);
    header.set_screen_window_center(V2f::new(0.5, -0.5));
    header.set_screen_window_width(1.5);

    let mut tc = TimeCode::new(23, 59, 58, 29).unwrap();
    tc.set_drop_frame(true);
    tc.set_bgf1(true);
    tc.set_binary_group(3, 0xa).unwrap();
    header.set("timeCode", tc).unwrap();
    let keycode = KeyCode {
        film_mfc_code: 1,
        film_type: 2,
        prefix: 3,
        count: 4,
        perf_offset: 5,
        perfs_per_frame: 6,
        perfs_per_count: 7,
    };
    header.set("keyCode", keycode).unwrap();
    header.set("framesPerSecond", Rational::new(24000, 1001)).unwrap();
    header.set("chromaticities", Chromaticities::default()).unwrap();
    header.set("worldToCamera", M44f::default()).unwrap();
    header.set("origin", V3i { x: 1, y: -2, z: 3 }).unwrap();
    header.set("lens", vec![35.0f32, 1.4]).unwrap();
    header.set("count", 42).unwrap();
    header.set("exposure", 0.125f64).unwrap();
    header.set_text("owner", "comp").unwrap();
    header
        .set("tags", vec![Text::new("a").unwrap(), Text::new("").unwrap()])
        .unwrap();
    header
        .set("preview", Preview::new(1, 2, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap())
        .unwrap();
    header.set_opaque("vendorBlob", "acmeData", vec![0, 1, 0, 255]).unwrap();
    header.set_opaque("emptyBlob", "acmeNothing", Vec::new()).unwrap();
    header.set_opaque("label", "string", "caf\u{e9}".as_bytes().to_vec()).unwrap();
    let mut views = Vec::new();
    for view in ["left", "gauche-\u{e9}"] {
        views.extend_from_slice(&(view.len() as i32).to_le_bytes());
        views.extend_from_slice(view.as_bytes());
    }
    header.set_opaque("multiView", "stringvector", views).unwrap();
    header.set("slateTimeCode", TimeCode::unpack(0x0000_000a, 7)).unwrap();
    header.set("aReallyLongAttributeNameThatNeedsTheLongNamesFlag", 1).unwrap();

    write_file(&path, &header, &[("Y", vec![0; 8])], 2);

    let file = InputFile::open(&path).unwrap();
    assert!(file.version().long_names);
    assert_eq!(file.header(), &header);
    assert_eq!(file.header().get_as::<TimeCode>("timeCode").unwrap(), tc);
    assert_eq!(file.header().get_as::<Rational>("framesPerSecond").unwrap(), Rational::new(24000, 1001));
    assert!(matches!(
        file.header().get("vendorBlob").unwrap(),
        AttributeValue::Opaque { type_name, bytes } if type_name == "acmeData" && bytes == &[0, 1, 0, 255]
    ));
    assert!(file.header().get_as::<i32>("owner").unwrap_err().is_type_error());
    assert!(file.header().get("multiView").unwrap().is_opaque());
    assert_eq!(
        file.header().get_as::<TimeCode>("slateTimeCode").unwrap().time_and_flags,
        0x0000_000a
    );
    assert_eq!(file.header().channels().unwrap().get("Y").unwrap().reserved, [1, 2, 3]);
}

#[test]
fn tiled_and_sampled_parts() {
    let dir = TempDir::new().unwrap();
    let mut rng = StdRng::seed_from_u64(5);

    // tiles, bottom-up
    let tiled_path = dir.path().join("tiled.exr");
    let mut header = Header::new(37, 29);
    header.set_channels(ChannelLayout::uniform(&["R", "G"], PixelType::Float).unwrap());
    header.set_tile_description(TileDescription::new(16, 8));
    header.set_line_order(LineOrder::DecreasingY);
    let red = random_bytes(&mut rng, 37 * 29 * 4);
    let green = random_bytes(&mut rng, 37 * 29 * 4);
    {
        let mut file = OutputFile::create(&tiled_path, &header).unwrap();
        let row = 37 * 4;
        let mut hi = 29;
        for rows in [5, 11, 13] {
            let lo = hi - rows;
            let frame = FrameBuffer::new()
                .with("R", &red[lo * row..hi * row])
                .with("G", &green[lo * row..hi * row]);
            file.write_pixels(&frame, rows).unwrap();
            hi = lo;
        }
        file.close().unwrap();
    }
    let mut file = InputFile::open(&tiled_path).unwrap();
    assert_eq!(file.header().tile_description(), Some(TileDescription::new(16, 8)));
    assert_eq!(file.channel("R").unwrap(), red);
    assert_eq!(file.channel("G").unwrap(), green);
    let rows = file.read_channel("G", None, Some(10..=12)).unwrap();
    assert_eq!(rows, &green[10 * 37 * 4..13 * 37 * 4]);

    // 4:2:0 style chroma with an odd, negative origin-aligned window
    let sampled_path = dir.path().join("sampled.exr");
    let mut header = Header::new(1, 1);
    header.set_data_window(Box2i::new(V2::new(-4, -6), V2::new(6, 4)));
    let mut layout = ChannelLayout::new();
    layout.insert("Y", Channel::new(PixelType::Half)).unwrap();
    layout
        .insert("RY", Channel::new(PixelType::Half).with_sampling(2, 2))
        .unwrap();
    layout
        .insert("BY", Channel::new(PixelType::Half).with_sampling(2, 2))
        .unwrap();
    header.set_channels(layout);
    header.set_compression(Compression::Zip);
    // 11 x 11 luma, 6 x 6 chroma
    let luma = random_halves(&mut rng, 11 * 11);
    let ry = random_halves(&mut rng, 6 * 6);
    let by = random_halves(&mut rng, 6 * 6);
    write_file(
        &sampled_path,
        &header,
        &[("Y", luma.clone()), ("RY", ry.clone()), ("BY", by.clone())],
        3,
    );

    let mut file = InputFile::open(&sampled_path).unwrap();
    assert_eq!(file.channel("Y").unwrap(), luma);
    assert_eq!(file.channel("RY").unwrap(), ry);
    let by_float = file.channel_as("BY", PixelType::Float).unwrap();
    assert_eq!(by_float.len(), 6 * 6 * 4);
    // rows -1..=1 contain one chroma row (y = 0)
    let middle = file.read_channel("BY", None, Some(-1..=1)).unwrap();
    assert_eq!(middle, &by[3 * 12..4 * 12]);
}

#[test]
fn decreasing_scanlines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("down.exr");
    let mut rng = StdRng::seed_from_u64(6);

    let mut header = Header::new(9, 50);
    header.set_channels(ChannelLayout::uniform(&["Z"], PixelType::Float).unwrap());
    header.set_line_order(LineOrder::DecreasingY);
    let data = random_bytes(&mut rng, 9 * 50 * 4);
    let row = 9 * 4;

    let mut file = OutputFile::create(&path, &header).unwrap();
    let mut hi = 50;
    while hi > 0 {
        let rows = hi.min(7);
        let lo = hi - rows;
        file.write_pixels(&FrameBuffer::new().with("Z", &data[lo * row..hi * row]), rows)
            .unwrap();
        hi = lo;
    }
    file.close().unwrap();

    let mut file = InputFile::open(&path).unwrap();
    assert_eq!(file.header().line_order().unwrap(), LineOrder::DecreasingY);
    assert_eq!(file.channel("Z").unwrap(), data);
}
