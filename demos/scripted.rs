use std::ptr::NonNull;

use tagalloc::Heap;

/// Prints where a block landed, as an offset from the first payload byte so
/// runs are comparable.
fn print_alloc(
  label: &str,
  size: usize,
  ptr: NonNull<u8>,
  origin: NonNull<u8>,
) {
  println!(
    "{} = allocate({}) -> {:?} (offset {})",
    label,
    size,
    ptr,
    ptr.as_ptr() as usize - origin.as_ptr() as usize
  );
}

/// Dumps every block in address order.
fn print_heap(heap: &Heap) {
  for block in heap.blocks() {
    match block {
      Ok(block) => println!("    [{:>4}] {:>4} bytes {}", block.offset, block.size, block.state),
      Err(corruption) => {
        println!("    corrupted heap: {}", corruption);
        return;
      }
    }
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  // RUST_LOG=debug shows every split and merge the allocator performs.
  env_logger::init();

  let mut heap = Heap::new();

  println!("Scripted run on a {} byte heap:", heap.capacity());

  // --------------------------------------------------------------------
  // 1) Two allocations land back to back: mem2 == mem + 32 + 8.
  // --------------------------------------------------------------------
  let mem = heap.allocate(32)?;
  let mem2 = heap.allocate(64)?;
  print_alloc("mem", 32, mem, mem);
  print_alloc("mem2", 64, mem2, mem);
  print_heap(&heap);

  // --------------------------------------------------------------------
  // 2) Freeing mem and asking for less reuses the same block.
  // --------------------------------------------------------------------
  heap.deallocate(mem)?;
  let mem_again = heap.allocate(18)?;
  print_alloc("mem", 18, mem_again, mem);
  println!("    reused freed block? {}", mem_again == mem);

  // --------------------------------------------------------------------
  // 3) More traffic around the freed middle block.
  // --------------------------------------------------------------------
  let test = heap.allocate(64)?;
  heap.deallocate(mem2)?;
  let test2 = heap.allocate(18)?;
  print_alloc("test", 64, test, mem);
  print_alloc("test2", 18, test2, mem);
  print_heap(&heap);

  // --------------------------------------------------------------------
  // 4) Requests beyond the whole heap always fail.
  // --------------------------------------------------------------------
  match heap.allocate(5000) {
    Ok(ptr) => println!("allocate(5000) unexpectedly succeeded at {:?}", ptr),
    Err(error) => println!("allocate(5000) failed: {}", error),
  }

  // --------------------------------------------------------------------
  // 5) Releasing everything coalesces back into one free block.
  // --------------------------------------------------------------------
  heap.deallocate(test2)?;
  heap.deallocate(test)?;
  heap.deallocate(mem_again)?;

  let stats = heap.check()?;
  println!(
    "After freeing everything: {} block(s), largest free = {} bytes",
    stats.blocks, stats.largest_free
  );
  print_heap(&heap);

  Ok(())
}
