//! Walks the public handle API end to end: construction, counted copies,
//! observers, polymorphic destruction, casts, and container integration.
//!
//! Run with `RUST_LOG=trace` to watch the control-block lifecycle.

use std::collections::HashMap;

use handle::{AsAny, Handle, HandleRef, Unique, dynamic_cast, impl_upcast, static_cast};
use log::info;

struct Sample {
    f1: f32,
    f2: f32,
    i1: i64,
}

impl Drop for Sample {
    fn drop(&mut self) {
        info!("sample destroyed at {:p}", self);
    }
}

trait Shape: AsAny {
    fn name(&self) -> &'static str;
    fn area(&self) -> f64;
}

struct Circle {
    radius: f64,
}

struct Square {
    side: f64,
}

impl Shape for Circle {
    fn name(&self) -> &'static str {
        "circle"
    }

    fn area(&self) -> f64 {
        core::f64::consts::PI * self.radius * self.radius
    }
}

impl Shape for Square {
    fn name(&self) -> &'static str {
        "square"
    }

    fn area(&self) -> f64 {
        self.side * self.side
    }
}

impl Drop for Circle {
    fn drop(&mut self) {
        info!("circle destroyed at {:p}", self);
    }
}

impl Drop for Square {
    fn drop(&mut self) {
        info!("square destroyed at {:p}", self);
    }
}

impl_upcast!(Circle => dyn Shape);
impl_upcast!(Square => dyn Shape);

fn shared_ownership() {
    println!("--- shared ownership ---");
    let constructed = Handle::new(Sample {
        f1: 23.5,
        f2: 19.2,
        i1: i64::MAX,
    });
    println!("constructed ref-count: {}", constructed.ref_count());

    let copy = constructed.clone();
    println!("ref-count after copy: {}", constructed.ref_count());
    println!(
        "fields through the handle: f1={} f2={} i1={}",
        constructed.f1, constructed.f2, constructed.i1
    );

    drop(copy);
    println!("ref-count after dropping the copy: {}", constructed.ref_count());
    println!("handle prints as its address: {constructed}");
}

fn observers() {
    println!("--- observers ---");
    let owner = Handle::new(Sample {
        f1: 1.0,
        f2: 2.0,
        i1: 3,
    });
    let observer: HandleRef<Sample> = owner.create_ref();
    println!(
        "observer sees ref-count {} / expired {}",
        observer.ref_count(),
        observer.expired()
    );

    let locked = observer.lock();
    println!("locked handle valid: {}", locked.is_valid());
    println!("ref-count while locked: {}", owner.ref_count());
    drop(locked);

    drop(owner);
    println!("after the owner drops, expired: {}", observer.expired());
    match observer.upgrade() {
        Some(_) => println!("unexpected promotion"),
        None => println!("promotion after expiration yields nothing"),
    }
}

fn polymorphic_ownership() {
    println!("--- polymorphic ownership ---");
    let shape: Handle<dyn Shape> = Handle::upcast(Circle { radius: 1.5 });
    println!("{} area: {:.3}", shape.name(), shape.area());

    let concrete = Handle::new(Square { side: 2.0 });
    let widened: Handle<dyn Shape> = static_cast(&concrete);
    println!(
        "widened {} shares the count: {}",
        widened.name(),
        concrete.ref_count()
    );

    let back: Handle<Square> = dynamic_cast(&widened);
    println!("checked narrowing back to square valid: {}", back.is_valid());

    let miss: Handle<Circle> = dynamic_cast(&widened);
    println!(
        "checked narrowing to circle valid: {} (yet it pins the square: ref-count {})",
        miss.is_valid(),
        concrete.ref_count()
    );
}

fn exclusive_ownership() {
    println!("--- exclusive ownership ---");
    let mut sole = Unique::new(Sample {
        f1: 0.5,
        f2: 0.25,
        i1: 1,
    });
    println!("sole owner valid: {}, f1={}", sole.is_valid(), sole.f1);

    let moved = sole;
    println!("after the move the new owner holds f2={}", moved.f2);

    let mut replacement = Unique::new(Sample {
        f1: 9.0,
        f2: 9.0,
        i1: 9,
    });
    replacement.swap(&mut Unique::empty());
    println!("replacement after swap-out valid: {}", replacement.is_valid());

    sole = moved;
    sole.reset();
    println!("after reset valid: {}", sole.is_valid());
}

fn container_integration() {
    println!("--- container integration ---");
    let first: Handle<dyn Shape> = Handle::upcast(Circle { radius: 1.0 });
    let second: Handle<dyn Shape> = Handle::upcast(Square { side: 3.0 });

    let mut labels: HashMap<Handle<dyn Shape>, &str> = HashMap::new();
    labels.insert(first.clone(), "unit circle");
    labels.insert(second.clone(), "big square");

    for (shape, label) in &labels {
        println!("{shape} ({}) is known as {label}", shape.name());
    }
    println!("lookup by a copied key: {}", labels[&first.clone()]);
}

fn main() {
    env_logger::init();

    shared_ownership();
    observers();
    polymorphic_ownership();
    exclusive_ownership();
    container_integration();
}
