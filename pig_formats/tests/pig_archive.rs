use std::io::Write;

use bytes::Bytes;
use memmap2::Mmap;
use pig_formats::bitmap::{BM_FLAG_PAGED_OUT, BM_FLAG_RLE, BM_FLAG_TRANSPARENT};
use pig_formats::pig::{
    DBM_FLAG_ANIMATED, DBM_FLAG_LARGE, MAX_BITMAPS, REGISTERED_10_PIG_SIZES,
    SHAREWARE_PIG_SIZES, XLAT_TABLE_SIZE,
};
use pig_formats::{FormatError, PigArchive, PigVariant};
use tempfile::NamedTempFile;

struct DiskBitmap {
    name: &'static str,
    dflags: u8,
    width: u8,
    height: u8,
    flags: u8,
    payload: Vec<u8>,
}

struct DiskSound {
    name: &'static str,
    length: u32,
    payload: Vec<u8>,
}

/// Directory block (counts, headers, payloads) with relative offsets.
fn directory(bitmaps: &[DiskBitmap], sounds: &[DiskSound]) -> (Vec<u8>, Vec<u32>) {
    let mut headers = Vec::new();
    let mut payloads = Vec::new();
    let mut relative = Vec::new();
    headers.extend_from_slice(&(bitmaps.len() as i32).to_le_bytes());
    headers.extend_from_slice(&(sounds.len() as i32).to_le_bytes());

    for bitmap in bitmaps {
        let mut name = [0u8; 8];
        name[..bitmap.name.len()].copy_from_slice(bitmap.name.as_bytes());
        headers.extend_from_slice(&name);
        headers.extend_from_slice(&[
            bitmap.dflags,
            bitmap.width,
            bitmap.height,
            bitmap.flags,
            0x2A,
        ]);
        relative.push(payloads.len() as u32);
        headers.extend_from_slice(&(payloads.len() as u32).to_le_bytes());
        payloads.extend_from_slice(&bitmap.payload);
    }
    for sound in sounds {
        let mut name = [0u8; 8];
        name[..sound.name.len()].copy_from_slice(sound.name.as_bytes());
        headers.extend_from_slice(&name);
        headers.extend_from_slice(&sound.length.to_le_bytes());
        headers.extend_from_slice(&(sound.payload.len() as u32).to_le_bytes());
        relative.push(payloads.len() as u32);
        headers.extend_from_slice(&(payloads.len() as u32).to_le_bytes());
        payloads.extend_from_slice(&sound.payload);
    }

    headers.extend_from_slice(&payloads);
    (headers, relative)
}

fn rle_payload(rows: &[&[u8]]) -> Vec<u8> {
    let body: usize = rows.iter().map(|row| row.len()).sum();
    let total = 4 + rows.len() + body;
    let mut data = (total as u32).to_le_bytes().to_vec();
    data.extend(rows.iter().map(|row| row.len() as u8));
    for row in rows {
        data.extend_from_slice(row);
    }
    data
}

fn sample_assets() -> (Vec<DiskBitmap>, Vec<DiskSound>) {
    let bitmaps = vec![
        DiskBitmap {
            name: "wall01",
            dflags: 0,
            width: 4,
            height: 2,
            flags: BM_FLAG_TRANSPARENT,
            payload: vec![1, 2, 3, 4, 5, 6, 7, 8],
        },
        DiskBitmap {
            name: "door",
            dflags: DBM_FLAG_ANIMATED | 3,
            width: 3,
            height: 2,
            flags: BM_FLAG_RLE | 0x40,
            payload: rle_payload(&[&[0xE3, 0x05, 0xE0], &[7, 0xE2, 9]]),
        },
    ];
    let sounds = vec![
        DiskSound {
            name: "laser",
            length: 6,
            payload: vec![0x74, 0x0C, 0x91],
        },
        DiskSound {
            name: "beep",
            length: 3,
            payload: vec![0x80, 0x90, 0xA0],
        },
    ];
    (bitmaps, sounds)
}

fn newer_archive(aux: &[u8], xlat: &[u16]) -> (Vec<u8>, Vec<u32>, usize) {
    let (bitmaps, sounds) = sample_assets();
    let (dir, relative) = directory(&bitmaps, &sounds);
    let start = 4 + aux.len() + XLAT_TABLE_SIZE;

    let mut data = (start as u32).to_le_bytes().to_vec();
    data.extend_from_slice(aux);
    for index in 0..MAX_BITMAPS {
        let value = xlat.get(index).copied().unwrap_or(index as u16);
        data.extend_from_slice(&value.to_le_bytes());
    }
    assert_eq!(data.len(), start);
    data.extend_from_slice(&dir);
    (data, relative, start)
}

#[test]
fn parses_newer_layout_with_translation_table() {
    let (data, relative, start) = newer_archive(b"TMAPINFO", &[0, 1, 2, 3, 4, 7]);
    let archive = PigArchive::from_bytes(data.clone()).unwrap();

    let layout = archive.layout();
    assert_eq!(layout.variant, PigVariant::Registered);
    assert_eq!(layout.directory_data_start, start);
    assert_eq!((layout.bitmap_count, layout.sound_count), (2, 2));
    assert_eq!(layout.header_size, 2 * 17 + 2 * 20);

    assert_eq!(
        archive.auxiliary_data().unwrap().as_slice(),
        b"TMAPINFO"
    );
    assert!(archive.has_translation_table());
    assert_eq!(archive.translate_bitmap_index(5), 7);
    assert_eq!(archive.translate_bitmap_index(2), 2);
    assert_eq!(archive.translate_bitmap_index(MAX_BITMAPS + 3), MAX_BITMAPS + 3);

    let base = layout.header_size + 8 + layout.directory_data_start;
    let bitmaps = archive.bitmaps();
    assert_eq!(bitmaps.len(), 3);
    assert_eq!(bitmaps.get(1).unwrap().offset(), relative[0] as usize + base);
    assert_eq!(bitmaps.get(2).unwrap().offset(), relative[1] as usize + base);
    assert_eq!(archive.sounds().get(0).unwrap().offset(), relative[2] as usize + base);
    assert_eq!(archive.sounds().get(1).unwrap().offset(), relative[3] as usize + base);

    let raw_offset = bitmaps.get(1).unwrap().offset();
    assert_eq!(archive.bitmap_pixels(1), &data[raw_offset..raw_offset + 8]);
}

#[test]
fn bitmaps_page_in_and_decode() {
    let (data, _, _) = newer_archive(&[], &[]);
    let archive = PigArchive::from_bytes(data).unwrap();
    let bitmaps = archive.bitmaps();

    let door = archive.find_bitmap_index_by_name("DOOR#3").unwrap();
    assert_eq!(door, 2);
    assert_eq!(archive.bitmap_flags(door), Some(BM_FLAG_PAGED_OUT));
    archive.page_in(door);
    assert_eq!(archive.bitmap_flags(door), Some(BM_FLAG_RLE));
    assert_eq!(archive.bitmap_pixels(door), &[5, 5, 5, 7, 9, 9]);
    assert_eq!(bitmaps.get(door).unwrap().average_color, 0x2A);

    archive.page_in_all();
    assert_eq!(bitmaps.flags(1), Some(BM_FLAG_TRANSPARENT));
    assert_eq!(archive.find_bitmap_index_by_name("missing"), None);
    assert_eq!(archive.bitmap_flags(0), Some(0));
    assert_eq!(archive.bitmap_flags(99), None);
}

#[test]
fn placeholder_survives_any_archive() {
    let (data, _, _) = newer_archive(&[], &[]);
    let archive = PigArchive::from_bytes(data).unwrap();
    let placeholder = archive.bitmaps().placeholder();
    assert_eq!((placeholder.width, placeholder.height), (64, 64));
    archive.page_in(0);
    let pixels = archive.bitmap_pixels(0);
    assert_eq!(pixels.len(), 4096);
    assert!(pixels.iter().all(|&p| p == 0));
}

#[test]
fn sounds_select_adpcm_by_stored_length() {
    let (data, _, _) = newer_archive(&[], &[]);
    let archive = PigArchive::from_bytes(data).unwrap();

    let laser = archive.find_sound_index_by_name("Laser").unwrap();
    assert!(archive.sounds().get(laser).unwrap().is_compressed());
    assert_eq!(archive.sound_pcm(laser), &[0x80; 6]);
    assert_eq!(archive.sound_pcm(laser), archive.sound_pcm(laser));

    let beep = archive.find_sound_index_by_name("beep").unwrap();
    assert_eq!(archive.sound_pcm(beep), &[0x80, 0x90, 0xA0]);
    assert_eq!(archive.decode_all_sounds(), 2);
}

#[test]
fn short_directory_start_skips_translation_table() {
    let (bitmaps, sounds) = sample_assets();
    let (dir, _) = directory(&bitmaps, &sounds);
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&dir);

    let archive = PigArchive::from_bytes(data).unwrap();
    assert_eq!(archive.layout().directory_data_start, 4);
    assert!(!archive.has_translation_table());
    assert!(archive.auxiliary_data().is_none());
    assert_eq!(archive.translate_bitmap_index(5), 5);
    assert_eq!(archive.bitmap_pixels(2), &[5, 5, 5, 7, 9, 9]);
}

#[test]
fn legacy_sizes_read_directory_from_offset_zero() {
    let bitmaps = vec![DiskBitmap {
        name: "big",
        dflags: DBM_FLAG_LARGE,
        width: 0,
        height: 1,
        flags: 0,
        payload: (0..=255u8).collect(),
    }];
    let (dir, _) = directory(&bitmaps, &[]);

    let mut data = dir.clone();
    data.resize(SHAREWARE_PIG_SIZES[1], 0);
    let archive = PigArchive::from_bytes(data).unwrap();
    assert_eq!(archive.variant(), PigVariant::Shareware);
    assert_eq!(archive.layout().directory_data_start, 0);
    let big = archive.bitmaps().get(1).unwrap();
    assert_eq!(big.width, 256);
    assert_eq!(big.offset(), 17 + 8);
    let pixels = archive.bitmap_pixels(1);
    assert_eq!(pixels.len(), 256);
    assert_eq!(pixels[255], 255);

    let mut data = vec![0u8; REGISTERED_10_PIG_SIZES[0]];
    data[..dir.len()].copy_from_slice(&dir);
    let archive = PigArchive::from_bytes(data).unwrap();
    assert_eq!(archive.variant(), PigVariant::Registered10);
    assert!(!archive.has_translation_table());
    assert_eq!(archive.bitmaps().len(), 2);
}

#[test]
fn headers_longer_than_file_are_invalid() {
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&3i32.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(&[0u8; 20]);
    assert!(matches!(
        PigArchive::from_bytes(data),
        Err(FormatError::InvalidDirectory(_))
    ));

    // 1000 bitmaps and 200 sounds cannot fit in a 40 byte file.
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&1000i32.to_le_bytes());
    data.extend_from_slice(&200i32.to_le_bytes());
    data.resize(40, 0);
    match PigArchive::from_bytes(data) {
        Err(FormatError::InvalidDirectory(message)) => assert!(message.contains("file has 40")),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn headers_ending_exactly_at_file_end_parse() {
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&1i32.to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    data.extend_from_slice(b"empty\0\0\0");
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(&0u32.to_le_bytes());

    let archive = PigArchive::from_bytes(data).unwrap();
    assert_eq!(archive.bitmaps().len(), 2);
    assert_eq!(archive.find_bitmap_index_by_name("empty"), Some(1));
    assert!(archive.bitmap_pixels(1).is_empty());
}

#[test]
fn oversized_counts_are_rejected() {
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&(MAX_BITMAPS as i32).to_le_bytes());
    data.extend_from_slice(&0i32.to_le_bytes());
    assert!(matches!(
        PigArchive::from_bytes(data),
        Err(FormatError::InvalidDirectory(_))
    ));
}

#[test]
fn corrupt_bitmap_does_not_affect_siblings() {
    let (bitmaps, sounds) = sample_assets();
    let (dir, _) = directory(&bitmaps, &sounds);
    let mut data = 4u32.to_le_bytes().to_vec();
    data.extend_from_slice(&dir);
    // Point the first bitmap far beyond the end of the file.
    let offset_field = 4 + 8 + 13;
    data[offset_field..offset_field + 4].copy_from_slice(&0x00FF_0000u32.to_le_bytes());

    let archive = PigArchive::from_bytes(data).unwrap();
    archive.page_in_all();
    assert!(matches!(
        archive.bitmaps().try_bitmap_pixels(1),
        Err(FormatError::Truncated { .. })
    ));
    assert_eq!(archive.bitmap_pixels(1).len(), 4096);
    assert_eq!(archive.bitmap_pixels(2), &[5, 5, 5, 7, 9, 9]);
}

#[test]
fn mapped_file_can_back_the_archive() {
    let (data, _, _) = newer_archive(&[], &[]);
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let mmap = unsafe { Mmap::map(file.as_file()) }.unwrap();
    let archive = PigArchive::from_bytes(Bytes::from_owner(mmap)).unwrap();
    assert_eq!(archive.bitmaps().len(), 3);
    assert_eq!(archive.bitmap_pixels(2), &[5, 5, 5, 7, 9, 9]);
}

#[test]
fn concurrent_first_access_decodes_once() {
    let (data, _, _) = newer_archive(&[], &[]);
    let archive = PigArchive::from_bytes(data).unwrap();

    let pointers: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| archive.bitmap_pixels(2).as_ptr() as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(pointers.windows(2).all(|pair| pair[0] == pair[1]));
}
