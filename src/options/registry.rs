//! Global decorator registry keyed by message type (and result type).
//!
//! Entries are type-erased behind `Any` and recovered by downcasting to the
//! concrete `Arc<dyn Decorator<T>>`. Each list stays sorted by ascending order;
//! equal orders keep registration order.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::handlers::{DecoratorRef, RequestDecoratorRef};

struct Registered {
    order: i32,
    decorator: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub(crate) struct DecoratorRegistry {
    broadcast: RwLock<HashMap<TypeId, Vec<Registered>>>,
    request: RwLock<HashMap<(TypeId, TypeId), Vec<Registered>>>,
}

impl DecoratorRegistry {
    pub(crate) fn add<T: Send + 'static>(&self, decorator: DecoratorRef<T>) {
        let entry = Registered {
            order: decorator.order(),
            decorator: Box::new(decorator),
        };
        let mut map = self.broadcast.write();
        insert_sorted(map.entry(TypeId::of::<T>()).or_default(), entry);
    }

    pub(crate) fn add_request<T: Send + 'static, R: Send + 'static>(
        &self,
        decorator: RequestDecoratorRef<T, R>,
    ) {
        let entry = Registered {
            order: decorator.order(),
            decorator: Box::new(decorator),
        };
        let mut map = self.request.write();
        insert_sorted(
            map.entry((TypeId::of::<T>(), TypeId::of::<R>())).or_default(),
            entry,
        );
    }

    pub(crate) fn get<T: Send + 'static>(&self) -> Vec<DecoratorRef<T>> {
        let map = self.broadcast.read();
        map.get(&TypeId::of::<T>())
            .map(|list| collect::<DecoratorRef<T>>(list))
            .unwrap_or_default()
    }

    pub(crate) fn get_request<T: Send + 'static, R: Send + 'static>(
        &self,
    ) -> Vec<RequestDecoratorRef<T, R>> {
        let map = self.request.read();
        map.get(&(TypeId::of::<T>(), TypeId::of::<R>()))
            .map(|list| collect::<RequestDecoratorRef<T, R>>(list))
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        let broadcast: usize = self.broadcast.read().values().map(Vec::len).sum();
        let request: usize = self.request.read().values().map(Vec::len).sum();
        broadcast + request
    }
}

/// Inserts after every entry with `order <= entry.order` (stable for ties).
fn insert_sorted(list: &mut Vec<Registered>, entry: Registered) {
    let pos = list
        .iter()
        .position(|r| r.order > entry.order)
        .unwrap_or(list.len());
    list.insert(pos, entry);
}

fn collect<D: Clone + 'static>(list: &[Registered]) -> Vec<D> {
    list.iter()
        .filter_map(|r| r.decorator.downcast_ref::<D>().cloned())
        .collect()
}
