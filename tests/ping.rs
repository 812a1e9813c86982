//! Kernel smoke test: two entities exchanging events, checking delivery
//! counts and the run-to-completion contract for zero-delay sends.

use std::cell::RefCell;
use std::rc::Rc;

use clustersim::kernel::{
    EntityId, EventType, Payload, SimContext, SimEntity, SimEvent, Simulation, SEND_NOW,
};

struct PingEntity {
    name: String,
    target: EntityId,
    interval: i64,
    number_ping: i64,
    pong_received: Rc<RefCell<i64>>,
}

impl SimEntity for PingEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_start(&mut self, ctx: &mut SimContext<'_>) {
        for i in 1..=self.number_ping {
            ctx.send(self.target, self.interval * i, EventType::TaskArrive, Payload::None);
        }
    }

    fn process(&mut self, _ctx: &mut SimContext<'_>, event: SimEvent) {
        if event.event_type() == EventType::TaskComplete {
            *self.pong_received.borrow_mut() += 1;
        }
    }
}

struct PongEntity {
    name: String,
    ping_received: Rc<RefCell<i64>>,
    reply_times: Rc<RefCell<Vec<i64>>>,
}

impl SimEntity for PongEntity {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, ctx: &mut SimContext<'_>, event: SimEvent) {
        if event.event_type() == EventType::TaskArrive {
            *self.ping_received.borrow_mut() += 1;
            self.reply_times.borrow_mut().push(ctx.time());
            ctx.send(event.source(), SEND_NOW, EventType::TaskComplete, Payload::None);
        }
    }
}

#[test]
fn ping_pong_counts_match() {
    let interval = 5;
    let number_ping = 3;

    let pings = Rc::new(RefCell::new(0));
    let pongs = Rc::new(RefCell::new(0));
    let times = Rc::new(RefCell::new(Vec::new()));

    let mut sim = Simulation::new();
    let pong = sim.register_entity(Box::new(PongEntity {
        name: "Pong".into(),
        ping_received: Rc::clone(&pings),
        reply_times: Rc::clone(&times),
    }));
    sim.register_entity(Box::new(PingEntity {
        name: "Ping".into(),
        target: pong,
        interval,
        number_ping,
        pong_received: Rc::clone(&pongs),
    }));

    sim.run().unwrap();

    assert_eq!(*pings.borrow(), number_ping);
    assert_eq!(*pongs.borrow(), number_ping);
    // pings are handled at i * interval
    assert_eq!(*times.borrow(), vec![5, 10, 15]);
    // the last pong was sent with delay 0, so the clock never moved past it
    assert_eq!(sim.current_time(), interval * number_ping);
}
