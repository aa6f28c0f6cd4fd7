use lopdf::{Dictionary, Document, Object, Stream};
use pdf_import::*;
use std::collections::BTreeMap;

/// Pages share one font object through their resources
fn create_test_pdf(num_pages: usize, rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources = Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "F1",
            Object::Reference(font_id),
        )])),
    )]);

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = format!("BT /F1 12 Tf 72 720 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Resources", Object::Dictionary(resources.clone())),
            ("Contents", Object::Reference(content_id)),
        ]);
        if let Some(rotate) = rotate {
            page.set("Rotate", Object::Integer(rotate));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(kids)),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200),
                Object::Integer(100),
            ]),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn importer_with_pages(key: &str, pages: &[u32]) -> (Importer, Vec<TemplateId>) {
    let mut importer = Importer::new();
    importer
        .bind_source(key, Source::Bytes(create_test_pdf(3, None)))
        .unwrap();
    let ids = pages
        .iter()
        .map(|page| importer.import_page(key, *page, PageBoxKind::MediaBox).unwrap())
        .collect();
    (importer, ids)
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window == needle.as_bytes())
}

#[test]
fn test_sequential_export_numbers_objects_densely() {
    let (mut importer, _) = importer_with_pages("a.pdf", &[1, 2]);
    importer.set_next_object_id("a.pdf", 10).unwrap();

    let export = importer.export_sequential("a.pdf").unwrap();

    // Two forms and the shared font
    assert_eq!(export.len(), 3);
    let numbers: Vec<u32> = export
        .iter()
        .map(|(id, _)| id.as_sequential().unwrap())
        .collect();
    assert_eq!(numbers, vec![10, 11, 12]);
    assert!(export.hash_positions.is_empty());

    assert_eq!(export.templates.len(), 2);
    for name in ["TPL0", "TPL1"] {
        let id = export.templates[name];
        let body = &export.objects[&id];
        assert!(body.starts_with(b"<<"));
        assert!(contains(body, "/Subtype /Form"));
        assert!(contains(body, "/BBox [0 0 200 100]"));
        assert!(!contains(body, " obj"));
    }
}

#[test]
fn test_shared_resources_are_exported_once() {
    let (importer, _) = importer_with_pages("a.pdf", &[1, 2, 3]);
    let export = importer.export_sequential("a.pdf").unwrap();

    let fonts: Vec<_> = export
        .iter()
        .filter(|(_, body)| contains(body, "/BaseFont /Helvetica"))
        .collect();
    assert_eq!(fonts.len(), 1);
    let font_id = fonts[0].0;

    let reference = format!("/F1 {} 0 R", font_id);
    for id in export.templates.values() {
        assert!(contains(&export.objects[id], &reference));
    }
}

#[test]
fn test_export_without_templates_is_empty() {
    let mut importer = Importer::new();
    importer
        .bind_source("a.pdf", Source::Bytes(create_test_pdf(1, None)))
        .unwrap();

    assert!(importer.export_sequential("a.pdf").unwrap().is_empty());
    assert!(importer.export_hashed("a.pdf").unwrap().is_empty());
}

#[test]
fn test_hashed_export_uses_hex_ids() {
    let (importer, _) = importer_with_pages("a.pdf", &[1, 2]);
    let export = importer.export_hashed("a.pdf").unwrap();

    assert_eq!(export.len(), 3);
    for (id, _) in export.iter() {
        let hash = id.as_hash().expect("hash id");
        let hex = hash.to_hex();
        assert_eq!(hex.len(), ContentHash::HEX_LEN);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    // Every embedded reference names an exported object
    let mut reference_count = 0;
    for (owner, positions) in &export.hash_positions {
        let body = &export.objects[owner];
        for (offset, target) in positions {
            let hex = target.as_hash().expect("hash target").to_hex();
            assert_eq!(&body[*offset..*offset + ContentHash::HEX_LEN], hex.as_bytes());
            assert!(export.objects.contains_key(target));
            reference_count += 1;
        }
    }
    assert_eq!(reference_count, 2);
}

#[test]
fn test_hashed_ids_are_stable_across_importers() {
    let (first, _) = importer_with_pages("a.pdf", &[1, 2]);
    let (second, _) = importer_with_pages("a.pdf", &[1, 2]);

    let a = first.export_hashed("a.pdf").unwrap();
    let b = second.export_hashed("a.pdf").unwrap();
    assert_eq!(a.order, b.order);
    assert_eq!(a.objects, b.objects);
}

#[test]
fn test_hashed_ids_differ_between_documents() {
    let mut importer = Importer::new();
    for key in ["a.pdf", "b.pdf"] {
        importer
            .bind_source(key, Source::Bytes(create_test_pdf(1, None)))
            .unwrap();
        importer.import_page(key, 1, PageBoxKind::MediaBox).unwrap();
    }

    let a = importer.export_hashed("a.pdf").unwrap();
    let b = importer.export_hashed("b.pdf").unwrap();
    for id in a.objects.keys() {
        assert!(!b.objects.contains_key(id));
    }
}

#[test]
fn test_hashed_export_renumbers_to_sequential() {
    let (mut importer, _) = importer_with_pages("a.pdf", &[2, 3]);
    importer.set_next_object_id("a.pdf", 7).unwrap();

    let sequential = importer.export_sequential("a.pdf").unwrap();
    let renumbered = importer.export_hashed("a.pdf").unwrap().into_sequential(7);

    assert_eq!(renumbered.order, sequential.order);
    assert_eq!(renumbered.templates, sequential.templates);
    assert_eq!(renumbered.objects, sequential.objects);
    assert!(renumbered.hash_positions.is_empty());
}

#[test]
fn test_configured_id_mode() {
    let options = ImportOptions {
        id_mode: IdMode::ContentHash,
        ..Default::default()
    };
    let mut importer: Importer = Importer::with_options(options);
    importer
        .bind_source("a.pdf", Source::Bytes(create_test_pdf(1, None)))
        .unwrap();
    importer.import_active_page(1, PageBoxKind::MediaBox).unwrap();

    let export = importer.export_active().unwrap();
    assert!(export.order.iter().all(|id| id.as_hash().is_some()));
}

#[test]
fn test_zero_object_id_rejected() {
    let (mut importer, _) = importer_with_pages("a.pdf", &[1]);
    assert!(matches!(
        importer.set_next_object_id("a.pdf", 0),
        Err(ImportError::Config(_))
    ));
    assert!(matches!(
        importer.set_next_object_id("b.pdf", 5),
        Err(ImportError::DocumentNotBound(_))
    ));
}

#[test]
fn test_uncompressed_templates_keep_content() {
    let options = ImportOptions {
        compress_templates: false,
        ..Default::default()
    };
    let mut importer: Importer = Importer::with_options(options);
    importer
        .bind_source("a.pdf", Source::Bytes(create_test_pdf(2, None)))
        .unwrap();
    importer.import_page("a.pdf", 2, PageBoxKind::MediaBox).unwrap();

    let export = importer.export_sequential("a.pdf").unwrap();
    let body = &export.objects[&export.templates["TPL0"]];
    assert!(!contains(body, "/Filter"));
    assert!(contains(body, "(Page 2) Tj"));
}

#[test]
fn test_rotated_page_swaps_size_and_sets_matrix() {
    let mut importer = Importer::new();
    importer
        .bind_source("r.pdf", Source::Bytes(create_test_pdf(1, Some(90))))
        .unwrap();
    let id = importer.import_page("r.pdf", 1, PageBoxKind::MediaBox).unwrap();

    let placement = importer.use_template(id, 0.0, 0.0, 0.0, 0.0).unwrap();
    assert_eq!((placement.width, placement.height), (100.0, 200.0));

    let export = importer.export_sequential("r.pdf").unwrap();
    let body = &export.objects[&export.templates["TPL0"]];
    assert!(contains(body, "/Matrix [0 -1 1 0 0 200]"));
}

#[test]
fn test_output_document_with_hashed_exports() {
    let mut importer = Importer::new();
    for key in ["a.pdf", "b.pdf"] {
        importer
            .bind_source(key, Source::Bytes(create_test_pdf(2, None)))
            .unwrap();
    }
    let first = importer.import_page("a.pdf", 1, PageBoxKind::MediaBox).unwrap();
    let second = importer.import_page("b.pdf", 2, PageBoxKind::MediaBox).unwrap();

    let mut output = OutputDocument::new();
    let mut numbers = BTreeMap::new();
    for key in ["a.pdf", "b.pdf"] {
        numbers.extend(output.add_export(importer.export_hashed(key).unwrap()).unwrap());
    }
    assert_eq!(numbers.len(), 2);

    for id in [first, second] {
        let placement = importer.use_template(id, 0.0, 0.0, 0.0, 0.0).unwrap();
        let mut xobjects = BTreeMap::new();
        xobjects.insert(placement.name.clone(), numbers[&placement.name]);
        output.add_page(
            placement.width,
            placement.height,
            &placement.content_op(placement.height),
            &xobjects,
        );
    }
    assert_eq!(output.page_count(), 2);

    let doc = Document::load_mem(&output.to_bytes()).unwrap();
    let pages = doc.get_pages();
    assert_eq!(pages.len(), 2);

    let page = doc.get_dictionary(pages[&2]).unwrap();
    let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
    let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
    let form_id = xobjects.get(b"TPL1").unwrap().as_reference().unwrap();
    let form = doc.get_object(form_id).unwrap().as_stream().unwrap();

    assert_eq!(form.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Form");
    assert_eq!(
        form.decompressed_content().unwrap(),
        b"BT /F1 12 Tf 72 720 Td (Page 2) Tj ET".to_vec()
    );
}

#[test]
fn test_output_document_with_sequential_export() {
    let (mut importer, ids) = importer_with_pages("a.pdf", &[1]);

    let mut output = OutputDocument::new();
    importer
        .set_next_object_id("a.pdf", output.next_object_id())
        .unwrap();
    let numbers = output
        .add_export(importer.export_sequential("a.pdf").unwrap())
        .unwrap();

    // The same numbers cannot be added twice
    assert!(matches!(
        output.add_export(importer.export_sequential("a.pdf").unwrap()),
        Err(ImportError::Config(_))
    ));

    let placement = importer.use_template(ids[0], 0.0, 0.0, 100.0, 0.0).unwrap();
    let mut xobjects = BTreeMap::new();
    xobjects.insert(placement.name.clone(), numbers["TPL0"]);
    output.add_page(100.0, 50.0, &placement.content_op(50.0), &xobjects);

    let doc = Document::load_mem(&output.to_bytes()).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

/// Resources and crop box live on the page tree node; the page only carries a group
fn create_inheriting_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Courier".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![
        (
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "F9",
                Object::Reference(font_id),
            )])),
        ),
        (
            "XObject",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "Ghost",
                Object::Reference((999, 0)),
            )])),
        ),
    ]));

    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT /F9 10 Tf 20 20 Td (Inherited) Tj ET".to_vec(),
    ));
    let page_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Page".to_vec())),
        ("Parent", Object::Reference(pages_id)),
        (
            "Group",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "S",
                Object::Name(b"Transparency".to_vec()),
            )])),
        ),
        ("Contents", Object::Reference(content_id)),
    ]));

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Kids", Object::Array(vec![Object::Reference(page_id)])),
        ("Count", Object::Integer(1)),
        ("Resources", Object::Reference(resources_id)),
        (
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(200),
                Object::Integer(100),
            ]),
        ),
        (
            "CropBox",
            Object::Array(vec![
                Object::Integer(10),
                Object::Integer(10),
                Object::Integer(110),
                Object::Integer(60),
            ]),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

#[test]
fn test_inherited_resources_crop_box_and_group_are_exported() {
    let mut importer = Importer::new();
    importer
        .bind_source("inherit.pdf", Source::Bytes(create_inheriting_pdf()))
        .unwrap();
    let id = importer
        .import_page("inherit.pdf", 1, PageBoxKind::CropBox)
        .unwrap();

    let placement = importer.use_template(id, 0.0, 0.0, 0.0, 0.0).unwrap();
    assert_eq!((placement.width, placement.height), (100.0, 50.0));

    let writer = importer.writer_for("inherit.pdf").unwrap();
    assert_eq!(writer.key(), "inherit.pdf");
    assert_eq!(writer.template_name(0), Some("TPL0"));
    assert_eq!(writer.template_name(1), None);
    // Only the font: the resource dictionary is inlined and the missing object skipped
    assert_eq!(writer.dependency_count(), 1);

    let export = importer.export_sequential("inherit.pdf").unwrap();
    assert_eq!(export.len(), 2);
    assert_eq!(export.templates["TPL0"], ObjectId::Sequential(1));

    let form = &export.objects[&ObjectId::Sequential(1)];
    assert!(contains(form, "/BBox [10 10 110 60]"));
    assert!(contains(form, "/Matrix [1 0 0 1 -10 -10]"));
    assert!(contains(form, "/F9 2 0 R"));
    assert!(contains(form, "/Group <</S /Transparency>>"));
    assert!(!contains(form, "/Parent"));

    let font = &export.objects[&ObjectId::Sequential(2)];
    assert!(contains(font, "/BaseFont /Courier"));
}

#[test]
fn test_dangling_resource_reference_becomes_null() {
    let mut importer = Importer::new();
    importer
        .bind_source("inherit.pdf", Source::Bytes(create_inheriting_pdf()))
        .unwrap();
    importer
        .import_page("inherit.pdf", 1, PageBoxKind::MediaBox)
        .unwrap();

    let sequential = importer.export_sequential("inherit.pdf").unwrap();
    let form = &sequential.objects[&sequential.templates["TPL0"]];
    assert!(contains(form, "/Ghost null"));
    assert!(!contains(form, "999 0 R"));

    let hashed = importer.export_hashed("inherit.pdf").unwrap();
    let form = &hashed.objects[&hashed.templates["TPL0"]];
    assert!(contains(form, "/Ghost null"));
    assert_eq!(hashed.into_sequential(1), sequential);
}

#[test]
fn test_set_next_object_id_for_active_document() {
    let mut importer = Importer::new();
    assert!(matches!(
        importer.set_active_next_object_id(4),
        Err(ImportError::NoActiveDocument)
    ));

    importer
        .bind_source("inherit.pdf", Source::Bytes(create_inheriting_pdf()))
        .unwrap();
    importer
        .import_active_page(1, PageBoxKind::MediaBox)
        .unwrap();
    importer.set_active_next_object_id(4).unwrap();

    let export = importer.export_active().unwrap();
    assert_eq!(export.templates["TPL0"], ObjectId::Sequential(4));
    assert!(matches!(
        importer.set_active_next_object_id(0),
        Err(ImportError::Config(_))
    ));
}
