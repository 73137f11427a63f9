//! Minimal usage: build a three-belt chain, feed it, and watch items flow.
//!
//! Run with: `cargo run --example conveyor_chain`

use beltline_core::belt::Belt;
use beltline_core::id::ItemTypeId;
use beltline_core::space::tiles;
use beltline_core::system::BeltSystem;

fn main() {
    let mut system = BeltSystem::new();
    system.set_verify(true);

    // Three belts of two tiles each, wired a -> b -> c.
    let mut ids = Vec::new();
    for _ in 0..3 {
        let mut belt = Belt::new(256);
        belt.set_length(tiles(2));
        ids.push(system.add_belt(belt));
    }
    system.connect_belts(ids[0], ids[1]).unwrap();
    system.connect_belts(ids[1], ids[2]).unwrap();

    let ore = ItemTypeId(7);
    for step in 0..40 {
        // Feed the chain head whenever there is room.
        if system.belt(ids[0]).unwrap().rear_space() >= 256 {
            system.append_item(ids[0], ore).unwrap();
        }
        system.tick();

        if step % 10 == 9 {
            println!("after tick {}:", step + 1);
            for &id in &ids {
                let belt = system.belt(id).unwrap();
                println!(
                    "  belt {:?}: {} items, rear space {}, reserved front {}",
                    id,
                    belt.items().len(),
                    belt.rear_space(),
                    belt.reserved_front_space(),
                );
            }
        }
    }

    let total: usize = system.belts().map(|(_, b)| b.items().len()).sum();
    println!("{total} items on the line after 40 ticks");
}
