//! XML projection of a knowledge structure.
//!
//! ```text
//! TwoA
//!   PCategories/PCategory[@xsd:id]/Rating
//!   RankOrder/Params/Threshold
//!   RankOrder/Ranks/Rank[@Index]/PCategory[@xsd:idref]
//!   KStructure/KSRank[@Index]/KState[@xsd:id, @Type]
//!     PCategories/PCategory[@xsd:idref]
//!     PreviousStates/KState[@xsd:idref]
//!     NextStates/KState[@xsd:idref]
//! ```

use std::collections::HashMap;
use std::fmt::Display;
use std::io::Cursor;
use std::sync::Arc;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::constants::{UNASSIGNED_RATING, UNASSIGNED_THRESHOLD};
use crate::ks::category::{CategoryRef, PCategory, Rank, RankOrder};
use crate::ks::state::{KState, KStructure, StateId, StateType};
use crate::ks::KsError;

pub const TWOA_NS: &str = "https://github.com/rageappliedgame/HatAsset";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

const TWOA: &str = "TwoA";
const PCATEGORIES: &str = "PCategories";
const PCATEGORY: &str = "PCategory";
const RATING: &str = "Rating";
const RANK_ORDER: &str = "RankOrder";
const PARAMS: &str = "Params";
const THRESHOLD: &str = "Threshold";
const RANKS: &str = "Ranks";
const RANK: &str = "Rank";
const KSTRUCTURE: &str = "KStructure";
const KSRANK: &str = "KSRank";
const KSTATE: &str = "KState";
const PREVIOUS_STATES: &str = "PreviousStates";
const NEXT_STATES: &str = "NextStates";
const INDEX_ATTR: &str = "Index";
const TYPE_ATTR: &str = "Type";
const ID_ATTR: &str = "xsd:id";
const IDREF_ATTR: &str = "xsd:idref";

fn xml_err(e: impl Display) -> KsError {
    KsError::Xml(e.to_string())
}

/// Encodes and decodes knowledge structures.
#[derive(Debug, Clone)]
pub struct XmlFactory {
    indent: usize,
}

impl Default for XmlFactory {
    fn default() -> Self {
        Self { indent: 2 }
    }
}

impl XmlFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero disables pretty printing.
    pub fn with_indent(indent: usize) -> Self {
        Self { indent }
    }

    pub fn create_xml(&self, ks: &KStructure) -> Result<String, KsError> {
        let mut out = XmlOut::new(self.indent);
        out.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
        let mut root = BytesStart::new(TWOA);
        root.push_attribute(("xmlns", TWOA_NS));
        root.push_attribute(("xmlns:xsd", XSD_NS));
        out.event(Event::Start(root))?;

        match ks.rank_order().filter(|_| ks.has_rank_order()) {
            Some(order) => write_rank_order(&mut out, order)?,
            None => tracing::warn!("Rank order is missing while writing the knowledge structure"),
        }

        if ks.has_ranks() {
            write_kstructure(&mut out, ks)?;
        } else {
            tracing::warn!("Knowledge structure has no ranks to write");
        }

        out.event(Event::End(BytesEnd::new(TWOA)))?;
        out.finish()
    }

    pub fn create_kstructure(&self, xml: &str) -> Result<KStructure, KsError> {
        let root = parse_document(xml)?;
        if root.name != TWOA {
            return Err(KsError::MissingElement(TWOA.to_string()));
        }

        let mut categories: HashMap<String, CategoryRef> = HashMap::new();
        for elem in root.select(&[PCATEGORIES, PCATEGORY]) {
            let id = elem.required_attr(ID_ATTR)?;
            let rating: f64 = elem
                .child(RATING)
                .ok_or_else(|| KsError::MissingElement(format!("{PCATEGORY}/{RATING}")))?
                .text
                .trim()
                .parse()
                .map_err(|_| KsError::Xml(format!("unable to parse rating for category {id}")))?;
            let category = if rating == UNASSIGNED_RATING {
                PCategory::unrated(id)
            } else {
                PCategory::new(id, rating)
            };
            categories.insert(id.to_string(), Arc::new(category));
        }
        let lookup = |id: &str| {
            categories
                .get(id)
                .cloned()
                .ok_or_else(|| KsError::UnknownReference(id.to_string()))
        };

        let mut order = RankOrder::new();
        let threshold_path = [RANK_ORDER, PARAMS, THRESHOLD];
        let threshold: f64 = root
            .select(&threshold_path)
            .first()
            .ok_or_else(|| KsError::MissingElement(threshold_path.join("/")))?
            .text
            .trim()
            .parse()
            .map_err(|_| KsError::Xml("unable to parse the threshold value".to_string()))?;
        if threshold != UNASSIGNED_THRESHOLD && !order.set_threshold(threshold) {
            return Err(KsError::InvalidThreshold(threshold));
        }

        for elem in root.select(&[RANK_ORDER, RANKS, RANK]) {
            let index = parse_index(elem)?;
            let mut rank = u32::try_from(index)
                .ok()
                .and_then(Rank::new)
                .ok_or(KsError::InvalidRankIndex(index))?;
            for cat_elem in elem.children_named(PCATEGORY) {
                rank.add_category(lookup(cat_elem.required_attr(IDREF_ATTR)?)?);
            }
            order.add_rank(rank, true);
        }

        let mut ks = KStructure::new(order);
        let mut states: HashMap<String, StateId> = HashMap::new();
        for rank_elem in root.select(&[KSTRUCTURE, KSRANK]) {
            let index = parse_index(rank_elem)?;
            let index = u32::try_from(index).map_err(|_| KsError::InvalidRankIndex(index))?;
            ks.add_rank(index);

            if index == 0 {
                let root_elem = rank_elem
                    .child(KSTATE)
                    .ok_or_else(|| KsError::MissingElement(format!("{KSRANK}/{KSTATE}")))?;
                let id = root_elem.required_attr(ID_ATTR)?;
                if let Some(root_id) = ks.root() {
                    if let Some(state) = ks.state_mut(root_id) {
                        state.set_id(id);
                    }
                    states.insert(id.to_string(), root_id);
                }
                continue;
            }

            for state_elem in rank_elem.children_named(KSTATE) {
                let id = state_elem.required_attr(ID_ATTR)?;
                let state_type: StateType = state_elem.required_attr(TYPE_ATTR)?.parse()?;
                let mut state = KState::with_id(id, state_type);
                for cat_elem in state_elem.select(&[PCATEGORIES, PCATEGORY]) {
                    state.add_category(lookup(cat_elem.required_attr(IDREF_ATTR)?)?);
                }

                let mut prev_ids = Vec::new();
                for prev_elem in state_elem.select(&[PREVIOUS_STATES, KSTATE]) {
                    let prev_id = prev_elem.required_attr(IDREF_ATTR)?;
                    let prev = states
                        .get(prev_id)
                        .copied()
                        .ok_or_else(|| KsError::UnknownReference(prev_id.to_string()))?;
                    prev_ids.push(prev);
                }

                let new_id = ks.add_state(index, state).ok_or_else(|| {
                    KsError::Xml(format!("state {id} does not fit rank {index}"))
                })?;
                for prev in prev_ids {
                    ks.link(prev, new_id);
                }
                states.insert(id.to_string(), new_id);
            }
        }

        tracing::debug!(
            ranks = ks.rank_count(),
            states = ks.state_count(),
            "Knowledge structure read from xml"
        );
        Ok(ks)
    }
}

fn parse_index(elem: &Element) -> Result<i64, KsError> {
    let raw = elem.required_attr(INDEX_ATTR)?;
    raw.trim()
        .parse()
        .map_err(|_| KsError::Xml(format!("unable to parse rank index '{raw}'")))
}

fn format_rating(rating: Option<f64>) -> String {
    rating.unwrap_or(UNASSIGNED_RATING).to_string()
}

fn write_rank_order(out: &mut XmlOut, order: &RankOrder) -> Result<(), KsError> {
    let mut ranks: Vec<&Rank> = order.ranks().iter().collect();
    ranks.sort_by_key(|r| r.index());

    out.start(PCATEGORIES, &[])?;
    for category in ranks.iter().flat_map(|r| r.categories()) {
        out.start(PCATEGORY, &[(ID_ATTR, category.id())])?;
        out.text_element(RATING, &format_rating(category.rating()))?;
        out.end(PCATEGORY)?;
    }
    out.end(PCATEGORIES)?;

    out.start(RANK_ORDER, &[])?;
    out.start(PARAMS, &[])?;
    let threshold = order.threshold().unwrap_or(UNASSIGNED_THRESHOLD);
    out.text_element(THRESHOLD, &threshold.to_string())?;
    out.end(PARAMS)?;
    out.start(RANKS, &[])?;
    for rank in ranks {
        let index = rank.index().map_or_else(|| "-1".to_string(), |i| i.to_string());
        out.start(RANK, &[(INDEX_ATTR, index.as_str())])?;
        for category in rank.categories() {
            out.empty(PCATEGORY, &[(IDREF_ATTR, category.id())])?;
        }
        out.end(RANK)?;
    }
    out.end(RANKS)?;
    out.end(RANK_ORDER)
}

fn write_kstructure(out: &mut XmlOut, ks: &KStructure) -> Result<(), KsError> {
    out.start(KSTRUCTURE, &[])?;
    for rank in ks.ranks() {
        let index = rank.index().to_string();
        out.start(KSRANK, &[(INDEX_ATTR, index.as_str())])?;
        for state in rank.states().iter().filter_map(|&s| ks.state(s)) {
            out.start(KSTATE, &[(ID_ATTR, state.id()), (TYPE_ATTR, state.state_type().as_str())])?;
            let category_refs: Vec<&str> = state.categories().iter().map(|c| c.id()).collect();
            write_refs(out, PCATEGORIES, PCATEGORY, &category_refs)?;
            let prev: Vec<&str> = state
                .prev_states()
                .iter()
                .filter_map(|&s| ks.state(s).map(KState::id))
                .collect();
            write_refs(out, PREVIOUS_STATES, KSTATE, &prev)?;
            let next: Vec<&str> = state
                .next_states()
                .iter()
                .filter_map(|&s| ks.state(s).map(KState::id))
                .collect();
            write_refs(out, NEXT_STATES, KSTATE, &next)?;
            out.end(KSTATE)?;
        }
        out.end(KSRANK)?;
    }
    out.end(KSTRUCTURE)
}

fn write_refs(out: &mut XmlOut, list: &str, item: &str, ids: &[&str]) -> Result<(), KsError> {
    if ids.is_empty() {
        return out.empty(list, &[]);
    }
    out.start(list, &[])?;
    for &id in ids {
        out.empty(item, &[(IDREF_ATTR, id)])?;
    }
    out.end(list)
}

struct XmlOut {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlOut {
    fn new(indent: usize) -> Self {
        let cursor = Cursor::new(Vec::new());
        let writer = if indent == 0 {
            Writer::new(cursor)
        } else {
            Writer::new_with_indent(cursor, b' ', indent)
        };
        Self { writer }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), KsError> {
        self.writer.write_event(event).map_err(xml_err)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), KsError> {
        let mut elem = BytesStart::new(name);
        for &attr in attrs {
            elem.push_attribute(attr);
        }
        self.event(Event::Start(elem))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), KsError> {
        let mut elem = BytesStart::new(name);
        for &attr in attrs {
            elem.push_attribute(attr);
        }
        self.event(Event::Empty(elem))
    }

    fn end(&mut self, name: &str) -> Result<(), KsError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), KsError> {
        self.start(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, KsError> {
        String::from_utf8(self.writer.into_inner().into_inner()).map_err(xml_err)
    }
}

/// Minimal element tree; the schema has no mixed content.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, KsError> {
        let mut elem = Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Element::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            elem.attrs.push((key, value));
        }
        Ok(elem)
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required_attr(&self, key: &str) -> Result<&str, KsError> {
        self.attr(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| KsError::MissingElement(format!("{}@{key}", self.name)))
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a Element> + 'n
    where
        'a: 'n,
    {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follows all but the last name through the first matching child and
    /// returns every child matching the last one.
    fn select(&self, path: &[&str]) -> Vec<&Element> {
        let Some((last, parents)) = path.split_last() else {
            return Vec::new();
        };
        let mut node = self;
        for name in parents {
            match node.child(name) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        node.children.iter().filter(|c| c.name == *last).collect()
    }
}

fn parse_document(xml: &str) -> Result<Element, KsError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let elem = Element::from_start(&start)?;
                attach(&mut stack, &mut root, elem);
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| KsError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, elem);
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    root.ok_or_else(|| KsError::MissingElement(TWOA.to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None => *root = Some(elem),
    }
}
