mod arena;
mod handle;
mod node;
mod raw_osllrb_map;
mod size;

pub(crate) use raw_osllrb_map::RawOSLlrbMap;
