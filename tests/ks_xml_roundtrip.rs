mod common;

use twoa_engine::ks::{KStructure, KsError, KsGenerator, StateType, XmlFactory};
use twoa_engine::store::{keys, DataStorage, MemoryStorage};

use common::fixtures::{expanded_worked_example, worked_example_categories};

fn edge_ids(ks: &KStructure) -> Vec<(String, String)> {
    let mut edges: Vec<(String, String)> = ks
        .states()
        .iter()
        .enumerate()
        .flat_map(|(id, state)| {
            ks.next_states_of(id)
                .into_iter()
                .map(|next| (state.id().to_string(), next.id().to_string()))
                .collect::<Vec<_>>()
        })
        .collect();
    edges.sort();
    edges
}

#[test]
fn expanded_structure_round_trips() {
    let ks = expanded_worked_example();
    assert!(ks.states().iter().any(|s| s.state_type() == StateType::Expanded));

    let factory = XmlFactory::new();
    let xml = factory.create_xml(&ks).expect("write xml");
    let restored = factory.create_kstructure(&xml).expect("read xml");

    assert_eq!(restored.rank_count(), ks.rank_count());
    assert_eq!(restored.state_count(), ks.state_count());
    assert_eq!(edge_ids(&restored), edge_ids(&ks));
    for state in ks.states() {
        let id = restored.state_by_id(state.id()).expect("state present");
        let copy = restored.state(id).unwrap();
        assert_eq!(copy.name(), state.name());
        assert_eq!(copy.state_type(), state.state_type());
    }

    let order = restored.rank_order().expect("rank order");
    assert_eq!(order.rank_count(), 5);
    assert_eq!(order.threshold(), Some(0.4));
    assert_eq!(order.category("d").and_then(|c| c.rating()), Some(32.19));

    // writing the restored structure again gives the same document
    assert_eq!(factory.create_xml(&restored).expect("rewrite"), xml);
}

#[test]
fn xml_document_is_stored_as_a_blob() {
    let xml = XmlFactory::new()
        .create_xml(&expanded_worked_example())
        .expect("write xml");
    let storage = MemoryStorage::new();
    storage.save(keys::KNOWLEDGE_STRUCTURE, &xml).expect("save");

    let loaded = storage.load(keys::KNOWLEDGE_STRUCTURE).expect("load");
    let ks = XmlFactory::new().create_kstructure(&loaded).expect("read xml");
    assert_eq!(ks.root().and_then(|r| ks.state(r)).map(|s| s.id()), Some("S0.1"));
}

#[test]
fn structure_without_rank_order_writes_an_empty_shell() {
    let xml = XmlFactory::new()
        .create_xml(&KStructure::default())
        .expect("write xml");
    assert!(!xml.contains("<RankOrder>"));
    assert!(!xml.contains("<KStructure>"));
    assert!(matches!(
        XmlFactory::new().create_kstructure(&xml),
        Err(KsError::MissingElement(_))
    ));
}

#[test]
fn out_of_range_threshold_is_rejected_on_read() {
    let generator = KsGenerator::with_threshold(0.4).unwrap();
    let order = generator
        .create_rank_order_from_cats(&worked_example_categories())
        .unwrap();
    let ks = generator.create_kstructure(&order).unwrap();
    let xml = XmlFactory::new()
        .create_xml(&ks)
        .unwrap()
        .replace("<Threshold>0.4</Threshold>", "<Threshold>1.5</Threshold>");
    assert_eq!(
        XmlFactory::new().create_kstructure(&xml).unwrap_err(),
        KsError::InvalidThreshold(1.5)
    );
}
