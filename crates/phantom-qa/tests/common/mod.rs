#![allow(dead_code)]

use std::path::Path;

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::tags;
use dicom_object::meta::FileMetaTableBuilder;
use dicom_object::InMemDicomObject;

pub const SIZE: usize = 240;
pub const SPACING_MM: f64 = 0.5;
const CENTERS: [f32; 3] = [44.0, 120.0, 196.0];
const RADIUS: f32 = 32.0;

/// Stored value of the tube in grid row `row`, column `col`.
pub fn tube_value(row: usize, col: usize) -> u16 {
    300 + 100 * (row * 3 + col) as u16
}

/// Value expected at 1-based tube `index` under the default column-major
/// numbering.
pub fn expected_value(index: usize) -> u16 {
    let i = index - 1;
    tube_value(i % 3, i / 3)
}

/// Phantom slice with the tubes at `slots` (row, col) only.
pub fn phantom_pixels(slots: &[(usize, usize)]) -> Vec<u16> {
    let mut px = vec![0u16; SIZE * SIZE];
    for &(row, col) in slots {
        let (cx, cy) = (CENTERS[col], CENTERS[row]);
        for y in 0..SIZE {
            for x in 0..SIZE {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= RADIUS * RADIUS {
                    px[y * SIZE + x] = tube_value(row, col);
                }
            }
        }
    }
    px
}

pub fn all_slots() -> Vec<(usize, usize)> {
    (0..3).flat_map(|r| (0..3).map(move |c| (r, c))).collect()
}

pub struct ScanFixture<'a> {
    pub patient_id: &'a str,
    pub manufacturer: &'a str,
    pub institution: &'a str,
    pub series_number: &'a str,
    pub series_description: &'a str,
    pub instance_number: i32,
    pub pixels: Vec<u16>,
}

impl Default for ScanFixture<'_> {
    fn default() -> Self {
        Self {
            patient_id: "UPBEAT_152E",
            manufacturer: "SIEMENS",
            institution: "Wake Forest Baptist",
            series_number: "14",
            series_description: "MOCO_T1_MAP",
            instance_number: 1,
            pixels: phantom_pixels(&all_slots()),
        }
    }
}

fn put_str(obj: &mut InMemDicomObject, tag: dicom_core::Tag, vr: VR, value: &str) {
    obj.put(DataElement::new(tag, vr, PrimitiveValue::from(value)));
}

pub fn write_scan(path: &Path, fixture: &ScanFixture<'_>) {
    let mut obj = InMemDicomObject::new_empty();
    put_str(&mut obj, tags::SOP_CLASS_UID, VR::UI, "1.2.840.10008.5.1.4.1.1.4");
    put_str(&mut obj, tags::SOP_INSTANCE_UID, VR::UI, "1.2.826.0.1.3680043.2.1143.1");
    put_str(&mut obj, tags::STUDY_DATE, VR::DA, "20170412");
    put_str(&mut obj, tags::MANUFACTURER, VR::LO, fixture.manufacturer);
    put_str(&mut obj, tags::INSTITUTION_NAME, VR::LO, fixture.institution);
    put_str(&mut obj, tags::MANUFACTURER_MODEL_NAME, VR::LO, "Skyra");
    put_str(&mut obj, tags::SOFTWARE_VERSIONS, VR::LO, "syngo MR E11");
    put_str(&mut obj, tags::PATIENT_NAME, VR::PN, "QA^T1MES");
    put_str(&mut obj, tags::PATIENT_ID, VR::LO, fixture.patient_id);
    put_str(&mut obj, tags::SERIES_DESCRIPTION, VR::LO, fixture.series_description);
    put_str(&mut obj, tags::SERIES_NUMBER, VR::IS, fixture.series_number);
    put_str(&mut obj, tags::INSTANCE_NUMBER, VR::IS, &fixture.instance_number.to_string());
    put_str(&mut obj, tags::PIXEL_SPACING, VR::DS, "0.5\\0.5");
    obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1u16)));
    obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(SIZE as u16)));
    obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(SIZE as u16)));
    obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(16u16)));
    obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(12u16)));
    obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0u16)));
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OW,
        PrimitiveValue::U16(fixture.pixels.iter().copied().collect()),
    ));

    let file = obj
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax("1.2.840.10008.1.2.1")
                .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.4")
                .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1143.1"),
        )
        .expect("file meta");
    file.write_to_file(path).expect("write dicom");
}
