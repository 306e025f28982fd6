use std::{io::Read, ptr::NonNull};

use rsegalloc::{ArenaPageSource, Heap, align};

/// Waits until the user presses ENTER.
/// Handy for attaching `gdb` or inspecting the process between steps.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints every free block, bucket by bucket.
fn print_free_lists(heap: &Heap<ArenaPageSource>) {
  println!("    free lists:");
  for block in heap.free_blocks() {
    println!(
      "      bucket {:>2}: header {:#x}, {} bytes",
      block.bucket, block.address, block.size
    );
  }
  println!("    {}", heap.stats());
}

fn print_alloc(
  label: &str,
  size: usize,
  ptr: NonNull<u8>,
) {
  println!("\n[{label}] allocate({size}) = {ptr:?}");
}

fn main() {
  env_logger::init();

  let mut heap = Heap::new(ArenaPageSource::new());

  unsafe {
    // --------------------------------------------------------------------
    // 1) First allocation. The heap is empty, so a chunk is requested,
    //    formatted as one big free block and split.
    // --------------------------------------------------------------------
    let first = heap.allocate(align!(13));
    print_alloc("1", align!(13), first);
    println!("    chunks acquired: {}", heap.source().acquired());

    first.as_ptr().cast::<u64>().write(0xDEADBEEF);
    println!("    value written = 0x{:X}", first.as_ptr().cast::<u64>().read());
    print_free_lists(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) A few more objects of different sizes, all carved from the
    //    remainder of the same chunk.
    // --------------------------------------------------------------------
    let second = heap.allocate(48);
    print_alloc("2", 48, second);
    let third = heap.allocate(256);
    print_alloc("2", 256, third);
    second.as_ptr().write_bytes(0xAB, 48);
    print_free_lists(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Free the first object. It goes to the front of its bucket; its
    //    neighbours are not merged with it.
    // --------------------------------------------------------------------
    heap.free(first.as_ptr());
    println!("\n[3] free({first:?})");
    print_free_lists(&heap);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Ask for the same size again: best fit hands back the same block.
    // --------------------------------------------------------------------
    let fourth = heap.allocate(align!(13));
    print_alloc("4", align!(13), fourth);
    println!(
      "    fourth == first? {}",
      if fourth == first {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) A request larger than what is left forces a second chunk.
    // --------------------------------------------------------------------
    let big = heap.allocate(4000);
    print_alloc("5", 4000, big);
    println!("    chunks acquired: {}", heap.source().acquired());
    print_free_lists(&heap);

    block_until_enter_pressed();

    for ptr in [second, third, fourth, big] {
      heap.free(ptr.as_ptr());
    }
    heap.finalize();

    println!("\n[6] End of walkthrough. Dropping the heap returns every chunk.");
    print_free_lists(&heap);
  }
}
