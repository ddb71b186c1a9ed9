use std::cell::{OnceCell, RefCell};
use std::sync::mpsc::{self, Receiver, Sender};

use serde::de::DeserializeOwned;
use zbus::blocking::Connection;
use zbus::zvariant::{DynamicType, OwnedObjectPath, OwnedValue};

use super::{ElementInfo, RegionSource, RegionSourceError, RegionSourceResult, WindowDescriptor};
use crate::geometry::{Point, Rect};

const A11Y_BUS_NAME: &str = "org.a11y.Bus";
const A11Y_BUS_PATH: &str = "/org/a11y/bus";
const REGISTRY_NAME: &str = "org.a11y.atspi.Registry";
const ROOT_PATH: &str = "/org/a11y/atspi/accessible/root";
const NULL_PATH: &str = "/org/a11y/atspi/null";
const ACCESSIBLE_IFACE: &str = "org.a11y.atspi.Accessible";
const COMPONENT_IFACE: &str = "org.a11y.atspi.Component";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";
/// `ATSPI_COORD_TYPE_SCREEN`
const COORD_TYPE_SCREEN: u32 = 0;
const MAX_DESCENT: usize = 32;

type ObjectRef = (String, OwnedObjectPath);
type LookupResult = RegionSourceResult<Option<ElementInfo>>;

/// Element lookup over the AT-SPI accessibility bus.
///
/// Queries run on a worker thread that keeps one bus connection open, so
/// `element_at` never blocks: it answers with the most recent finished lookup
/// and asks about `point` only when no lookup is running.
#[derive(Debug, Default)]
pub struct AtspiElementSource {
    lookup: OnceCell<ElementLookup>,
}

impl RegionSource for AtspiElementSource {
    fn windows(&self) -> RegionSourceResult<Vec<WindowDescriptor>> {
        Ok(Vec::new())
    }

    fn element_at(&self, point: Point) -> RegionSourceResult<Option<ElementInfo>> {
        self.lookup
            .get_or_init(|| ElementLookup::spawn(bus_lookup()))
            .element_at(point)
    }
}

#[derive(Debug, Default)]
struct LookupSlot {
    in_flight: bool,
    latest: Option<ElementInfo>,
}

#[derive(Debug)]
struct ElementLookup {
    requests: Sender<Point>,
    results: Receiver<LookupResult>,
    slot: RefCell<LookupSlot>,
}

impl ElementLookup {
    fn spawn<F>(mut lookup: F) -> Self
    where
        F: FnMut(Point) -> LookupResult + Send + 'static,
    {
        let (requests, request_rx) = mpsc::channel::<Point>();
        let (result_tx, results) = mpsc::channel();
        std::thread::spawn(move || {
            for point in request_rx {
                if result_tx.send(lookup(point)).is_err() {
                    break;
                }
            }
            tracing::debug!("accessibility lookup worker stopped");
        });
        Self {
            requests,
            results,
            slot: RefCell::new(LookupSlot::default()),
        }
    }

    fn element_at(&self, point: Point) -> LookupResult {
        let mut slot = self.slot.borrow_mut();
        for result in self.results.try_iter() {
            slot.in_flight = false;
            slot.latest = result.unwrap_or_else(|err| {
                tracing::debug!(?err, "accessibility lookup failed");
                None
            });
        }
        if !slot.in_flight {
            self.requests
                .send(point)
                .map_err(|_| query_failed("accessibility lookup worker is gone"))?;
            slot.in_flight = true;
        }
        Ok(slot.latest.clone())
    }
}

/// Lookup closure for the worker thread. The bus connection is opened on
/// first use and kept; a failed open is retried on the next lookup.
fn bus_lookup() -> impl FnMut(Point) -> LookupResult + Send + 'static {
    let mut connection: Option<Connection> = None;
    move |point| {
        if connection.is_none() {
            connection = Some(accessibility_bus()?);
        }
        match connection.as_ref() {
            Some(connection) => element_at_point(connection, point),
            None => Ok(None),
        }
    }
}

fn element_at_point(connection: &Connection, point: Point) -> LookupResult {
    let (x, y) = (point.x.round() as i32, point.y.round() as i32);

    for application in call::<_, Vec<ObjectRef>>(
        connection,
        &(REGISTRY_NAME.to_string(), owned_path(ROOT_PATH)?),
        ACCESSIBLE_IFACE,
        "GetChildren",
        &(),
    )? {
        let Ok(frames) = call::<_, Vec<ObjectRef>>(
            connection,
            &application,
            ACCESSIBLE_IFACE,
            "GetChildren",
            &(),
        ) else {
            continue;
        };
        for frame in frames {
            let Ok(bounds) = extents(connection, &frame) else {
                continue;
            };
            if !bounds.contains(point) {
                continue;
            }
            let target = deepest_at(connection, frame, x, y);
            let bounds = extents(connection, &target)?;
            let title = name(connection, &target).ok().filter(|t| !t.is_empty());
            tracing::debug!(?bounds, ?title, "accessibility element resolved");
            return Ok(Some(ElementInfo { bounds, title }));
        }
    }

    Ok(None)
}

fn query_failed(err: impl std::fmt::Display) -> RegionSourceError {
    RegionSourceError::AccessibilityQueryFailed {
        message: err.to_string(),
    }
}

fn owned_path(path: &str) -> RegionSourceResult<OwnedObjectPath> {
    OwnedObjectPath::try_from(path).map_err(query_failed)
}

fn accessibility_bus() -> RegionSourceResult<Connection> {
    let session = Connection::session().map_err(query_failed)?;
    let reply = session
        .call_method(
            Some(A11Y_BUS_NAME),
            A11Y_BUS_PATH,
            Some(A11Y_BUS_NAME),
            "GetAddress",
            &(),
        )
        .map_err(query_failed)?;
    let body = reply.body();
    let address: String = body.deserialize().map_err(query_failed)?;
    zbus::blocking::connection::Builder::address(address.as_str())
        .and_then(|builder| builder.build())
        .map_err(query_failed)
}

fn call<B, R>(
    connection: &Connection,
    object: &ObjectRef,
    interface: &str,
    method: &str,
    args: &B,
) -> RegionSourceResult<R>
where
    B: serde::Serialize + DynamicType,
    R: DeserializeOwned + zbus::zvariant::Type,
{
    let reply = connection
        .call_method(
            Some(object.0.as_str()),
            object.1.as_str(),
            Some(interface),
            method,
            args,
        )
        .map_err(query_failed)?;
    let body = reply.body();
    body.deserialize::<R>().map_err(query_failed)
}

fn extents(connection: &Connection, object: &ObjectRef) -> RegionSourceResult<Rect> {
    let (x, y, width, height): (i32, i32, i32, i32) = call(
        connection,
        object,
        COMPONENT_IFACE,
        "GetExtents",
        &(COORD_TYPE_SCREEN,),
    )?;
    if width <= 0 || height <= 0 {
        return Err(query_failed(format!(
            "element reported empty extents {width}x{height}"
        )));
    }
    Ok(Rect::new(
        f64::from(x),
        f64::from(y),
        f64::from(width),
        f64::from(height),
    ))
}

fn name(connection: &Connection, object: &ObjectRef) -> RegionSourceResult<String> {
    let value: OwnedValue = call(
        connection,
        object,
        PROPERTIES_IFACE,
        "Get",
        &(ACCESSIBLE_IFACE, "Name"),
    )?;
    String::try_from(value).map_err(query_failed)
}

/// Walks `GetAccessibleAtPoint` down from `start` until no deeper child answers.
fn deepest_at(connection: &Connection, start: ObjectRef, x: i32, y: i32) -> ObjectRef {
    let mut current = start;
    for _ in 0..MAX_DESCENT {
        let child: RegionSourceResult<ObjectRef> = call(
            connection,
            &current,
            COMPONENT_IFACE,
            "GetAccessibleAtPoint",
            &(x, y, COORD_TYPE_SCREEN),
        );
        match child {
            Ok(child) if child.1.as_str() != NULL_PATH && child != current => current = child,
            _ => break,
        }
    }
    current
}
