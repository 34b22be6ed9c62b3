//! Embedded HTML/CSS/JS frontend for the insights web dashboard.
//!
//! The entire SPA is compiled into the binary as a string constant.
//! No external assets, no build tools, no CDN dependencies. Charts are drawn
//! as inline SVG from the series returned by `/api/session/charts`.

/// The complete single-page dashboard HTML.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Community Insights</title>
<style>
:root {
  --bg: #0d1117;
  --surface: #161b22;
  --border: #30363d;
  --text: #e6edf3;
  --text-muted: #8b949e;
  --accent: #58a6ff;
  --green: #3fb950;
  --yellow: #d29922;
  --red: #f85149;
  --purple: #bc8cff;
  --cyan: #39d2c0;
  --radius: 8px;
  --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', Helvetica, Arial, sans-serif;
  --mono: 'SF Mono', 'Cascadia Code', 'Fira Code', monospace;
}

* { margin: 0; padding: 0; box-sizing: border-box; }
body {
  background: var(--bg);
  color: var(--text);
  font-family: var(--font);
  font-size: 14px;
  line-height: 1.5;
}

.app { max-width: 1200px; margin: 0 auto; padding: 24px; }

header {
  display: flex;
  align-items: center;
  justify-content: space-between;
  margin-bottom: 24px;
  padding-bottom: 16px;
  border-bottom: 1px solid var(--border);
}
header h1 { font-size: 24px; font-weight: 600; }
header .subtitle { color: var(--text-muted); font-size: 13px; }

.badge {
  display: inline-flex;
  padding: 4px 10px;
  border-radius: 12px;
  font-size: 12px;
  font-weight: 500;
  background: var(--surface);
  border: 1px solid var(--border);
}
.badge.ok { border-color: var(--green); color: var(--green); }
.badge.err { border-color: var(--red); color: var(--red); }

.card {
  background: var(--surface);
  border: 1px solid var(--border);
  border-radius: var(--radius);
  padding: 20px;
  margin-bottom: 16px;
}
.card h2 { font-size: 15px; font-weight: 600; margin-bottom: 12px; }
.muted { color: var(--text-muted); }

.kpis { display: grid; grid-template-columns: repeat(4, 1fr); gap: 16px; margin-bottom: 16px; }
.kpi .value { font-size: 28px; font-weight: 700; font-family: var(--mono); }
.kpi .label { color: var(--text-muted); font-size: 12px; text-transform: uppercase; }

button {
  padding: 8px 16px;
  border: 1px solid var(--border);
  border-radius: 6px;
  background: var(--bg);
  color: var(--text);
  font-size: 13px;
  cursor: pointer;
}
button:hover:not(:disabled) { border-color: var(--accent); }
button:disabled { opacity: 0.5; cursor: default; }
button.primary { background: var(--accent); border-color: var(--accent); color: var(--bg); }

.banner { padding: 10px 14px; border-radius: 6px; margin-bottom: 16px; display: none; }
.banner.error { display: block; border: 1px solid var(--red); color: var(--red); }
.banner.notice { display: block; border: 1px solid var(--yellow); color: var(--yellow); }

.suggestions { display: grid; grid-template-columns: repeat(auto-fill, minmax(260px, 1fr)); gap: 12px; }
.suggestion { border: 1px solid var(--border); border-radius: 6px; padding: 12px; }
.suggestion .kind { font-family: var(--mono); font-size: 11px; color: var(--purple); }
.suggestion p { font-size: 12px; color: var(--text-muted); margin: 6px 0 10px; }

.charts { display: grid; grid-template-columns: repeat(auto-fill, minmax(520px, 1fr)); gap: 16px; }
svg text { fill: var(--text-muted); font-size: 11px; }
.legend { display: flex; flex-wrap: wrap; gap: 10px; margin-top: 8px; font-size: 12px; }
.legend span::before { content: ''; display: inline-block; width: 10px; height: 10px; margin-right: 4px; background: var(--c); }

.hidden { display: none; }
</style>
</head>
<body>
<div class="app">
  <header>
    <div>
      <h1>Community Insights</h1>
      <div class="subtitle">Upload a member CSV to see KPIs, a summary and suggested charts</div>
    </div>
    <span id="health" class="badge">backend: checking</span>
  </header>

  <div id="error" class="banner"></div>
  <div id="notice" class="banner"></div>

  <div id="upload-card" class="card">
    <h2>Upload data</h2>
    <input id="file" type="file" accept=".csv">
    <button id="upload-btn" class="primary">Upload</button>
  </div>

  <div id="session" class="hidden">
    <div class="kpis">
      <div class="card kpi"><div class="value" id="kpi-total">0</div><div class="label">Total members</div></div>
      <div class="card kpi"><div class="value" id="kpi-active">0</div><div class="label">Active members</div></div>
      <div class="card kpi"><div class="value" id="kpi-new">0</div><div class="label">New members</div></div>
      <div class="card kpi"><div class="value" id="kpi-source">-</div><div class="label">Top source</div></div>
    </div>

    <div class="card">
      <h2>Summary</h2>
      <p id="summary" class="muted"></p>
      <br>
      <button id="summary-btn">Regenerate summary</button>
    </div>

    <div class="card">
      <h2>Suggested charts</h2>
      <div id="suggestions" class="suggestions"></div>
      <br>
      <button id="suggest-btn">Suggest charts</button>
      <button id="reset-btn">Reset</button>
    </div>

    <div id="charts" class="charts"></div>
  </div>
</div>

<script>
// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------
let session = null;
const COLORS = ['#58a6ff', '#3fb950', '#d29922', '#f85149', '#bc8cff', '#39d2c0', '#ff7b72', '#79c0ff'];

// ---------------------------------------------------------------------------
// API helpers
// ---------------------------------------------------------------------------
async function api(method, path, body, raw) {
  const opts = { method, headers: {} };
  if (raw) {
    opts.body = raw;
  } else if (body) {
    opts.headers['Content-Type'] = 'application/json';
    opts.body = JSON.stringify(body);
  }
  const res = await fetch(path, opts);
  const json = await res.json();
  if (!res.ok) throw new Error(json.error || res.statusText);
  return json;
}

function fmt(n) {
  if (n === undefined || n === null) return '-';
  return n.toLocaleString();
}

function esc(s) {
  return String(s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

function banner(id, text) {
  const el = document.getElementById(id);
  el.textContent = text || '';
  el.className = 'banner' + (text ? ' ' + id : '');
}

async function run(action) {
  try {
    session = await action();
  } catch (e) {
    // The request failed at the HTTP level; resync so no button stays busy.
    try {
      session = await api('GET', '/api/session');
      await render();
    } catch (_) {
      ['upload-btn', 'suggest-btn', 'summary-btn'].forEach(id => setBusy(id, false));
    }
    banner('error', e.message);
    return;
  }
  await render();
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------
document.getElementById('upload-btn').addEventListener('click', () => {
  const file = document.getElementById('file').files[0];
  if (!file) return banner('error', 'Choose a CSV file first.');
  setBusy('upload-btn', true, 'Uploading...');
  run(() => api('POST', '/api/session/upload?name=' + encodeURIComponent(file.name), null, file));
});

document.getElementById('suggest-btn').addEventListener('click', () => {
  setBusy('suggest-btn', true, 'Generating...');
  run(() => api('POST', '/api/session/suggest'));
});

document.getElementById('summary-btn').addEventListener('click', () => {
  setBusy('summary-btn', true, 'Summarizing...');
  run(() => api('POST', '/api/session/summarize'));
});

document.getElementById('reset-btn').addEventListener('click', () => {
  document.getElementById('file').value = '';
  run(() => api('POST', '/api/session/reset'));
});

document.getElementById('suggestions').addEventListener('click', e => {
  const id = e.target.dataset.add;
  if (id) run(() => api('POST', '/api/session/charts', { id }));
});

function setBusy(id, busy, label) {
  const el = document.getElementById(id);
  if (!el.dataset.label) el.dataset.label = el.textContent;
  el.disabled = busy;
  el.textContent = busy ? label : el.dataset.label;
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------
async function render() {
  const s = session;
  banner('error', s.error);
  banner('notice', s.notice);

  const ready = s.phase === 'ready' || s.phase === 'generating-suggestions';
  document.getElementById('upload-card').classList.toggle('hidden', ready);
  document.getElementById('session').classList.toggle('hidden', !ready);
  setBusy('upload-btn', s.busy.upload || s.phase === 'uploading', 'Uploading...');
  setBusy('suggest-btn', s.busy.suggest || s.phase === 'generating-suggestions', 'Generating...');
  setBusy('summary-btn', s.busy.summarize, 'Summarizing...');
  if (!ready) {
    document.getElementById('charts').innerHTML = '';
    return;
  }

  const k = s.kpis || {};
  document.getElementById('kpi-total').textContent = fmt(k.totalMembers);
  document.getElementById('kpi-active').textContent = fmt(k.activeMembers);
  document.getElementById('kpi-new').textContent = fmt(k.newMembers);
  document.getElementById('kpi-source').textContent = k.topAcquisitionSource || '-';
  document.getElementById('summary').textContent = s.summary || 'No summary yet.';

  document.getElementById('suggestions').innerHTML = s.suggested.length === 0
    ? '<span class="muted">No suggestions yet.</span>'
    : s.suggested.map(d => `
      <div class="suggestion">
        <div class="kind">${esc(d.kind)}</div>
        <strong>${esc(d.title)}</strong>
        <p>${esc(d.description || '')}</p>
        <button data-add="${esc(d.id)}" ${s.active.includes(d.id) ? 'disabled' : ''}>
          ${s.active.includes(d.id) ? 'Added' : 'Add to dashboard'}
        </button>
      </div>`).join('');

  const charts = await api('GET', '/api/session/charts');
  document.getElementById('charts').innerHTML = charts.map(c => `
    <div class="card">
      <h2>${esc(c.descriptor.title)}</h2>
      ${drawChart(c.descriptor, c.series)}
    </div>`).join('');
}

// ---------------------------------------------------------------------------
// Charts (inline SVG)
// ---------------------------------------------------------------------------
const W = 480, H = 260, PAD = 40;

function drawChart(d, series) {
  if (!['pie', 'bar', 'line', 'area'].includes(d.kind)) {
    return `<p class="muted">Chart type "${esc(d.kind)}" not supported</p>`;
  }
  if (series.points.length === 0) {
    return '<p class="muted">No data available for this chart</p>';
  }
  switch (d.kind) {
    case 'pie': return drawPie(series.points);
    case 'bar': return drawBars(series.points);
    default: return drawLine(series.points, d.kind === 'area');
  }
}

function drawPie(points) {
  const total = points.reduce((a, p) => a + p.value, 0) || 1;
  const cx = W / 2, cy = H / 2, r = H / 2 - 10;
  let angle = -Math.PI / 2;
  const slices = points.map((p, i) => {
    const sweep = (p.value / total) * Math.PI * 2;
    const x1 = cx + r * Math.cos(angle), y1 = cy + r * Math.sin(angle);
    angle += sweep;
    const x2 = cx + r * Math.cos(angle), y2 = cy + r * Math.sin(angle);
    const large = sweep > Math.PI ? 1 : 0;
    const color = COLORS[i % COLORS.length];
    if (points.length === 1) return `<circle cx="${cx}" cy="${cy}" r="${r}" fill="${color}"/>`;
    return `<path d="M${cx},${cy} L${x1},${y1} A${r},${r} 0 ${large} 1 ${x2},${y2} Z" fill="${color}"/>`;
  }).join('');
  const legend = points.map((p, i) =>
    `<span style="--c:${COLORS[i % COLORS.length]}">${esc(p.label)}: ${(p.value / total * 100).toFixed(0)}%</span>`
  ).join('');
  return `<svg viewBox="0 0 ${W} ${H}" width="100%">${slices}</svg><div class="legend">${legend}</div>`;
}

function drawBars(points) {
  const max = Math.max(...points.map(p => p.value), 1);
  const bw = (W - PAD * 2) / points.length;
  const bars = points.map((p, i) => {
    const h = (p.value / max) * (H - PAD * 2);
    const x = PAD + i * bw;
    return `<rect x="${x + 4}" y="${H - PAD - h}" width="${Math.max(bw - 8, 2)}" height="${h}" fill="${COLORS[0]}"><title>${esc(p.label)}: ${p.value}</title></rect>
      <text x="${x + bw / 2}" y="${H - PAD + 14}" text-anchor="middle">${esc(p.label).slice(0, 12)}</text>`;
  }).join('');
  return `<svg viewBox="0 0 ${W} ${H}" width="100%">${bars}<text x="${PAD}" y="${PAD - 8}">${fmt(max)}</text></svg>`;
}

function drawLine(points, filled) {
  const max = Math.max(...points.map(p => p.value), 1);
  const step = points.length > 1 ? (W - PAD * 2) / (points.length - 1) : 0;
  const xy = points.map((p, i) => [PAD + i * step, H - PAD - (p.value / max) * (H - PAD * 2)]);
  const line = xy.map(([x, y]) => `${x},${y}`).join(' ');
  const area = filled
    ? `<polygon points="${PAD},${H - PAD} ${line} ${xy[xy.length - 1][0]},${H - PAD}" fill="${COLORS[1]}" opacity="0.3"/>`
    : '';
  const first = points[0].label, last = points[points.length - 1].label;
  return `<svg viewBox="0 0 ${W} ${H}" width="100%">${area}
    <polyline points="${line}" fill="none" stroke="${COLORS[1]}" stroke-width="2"/>
    <text x="${PAD}" y="${H - PAD + 14}">${esc(first)}</text>
    <text x="${W - PAD}" y="${H - PAD + 14}" text-anchor="end">${esc(last)}</text>
    <text x="${PAD}" y="${PAD - 8}">${fmt(max)} members</text></svg>`;
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------
(async function init() {
  run(() => api('GET', '/api/session'));
  try {
    const h = await api('GET', '/api/health');
    const el = document.getElementById('health');
    el.textContent = 'backend: ' + (h.backendAvailable ? 'online' : 'offline');
    el.className = 'badge ' + (h.backendAvailable ? 'ok' : 'err');
  } catch (e) {
    /* health badge stays in its initial state */
  }
})();
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn function_body(name: &str) -> &'static str {
        let start = INDEX_HTML
            .find(&format!("async function {name}("))
            .expect("function present");
        let rest = &INDEX_HTML[start..];
        &rest[..rest.find("\n}\n").expect("function closed")]
    }

    #[test]
    fn failed_request_resyncs_session_before_showing_error() {
        let run = function_body("run");
        let catch = &run[run.find("catch (e)").unwrap()..];
        let resync = catch.find("api('GET', '/api/session')").unwrap();
        let banner = catch.find("banner('error', e.message)").unwrap();
        assert!(resync < banner);
        assert!(catch.contains("setBusy(id, false)"));
    }

    #[test]
    fn render_restores_every_busy_button() {
        let render = function_body("render");
        for id in ["upload-btn", "suggest-btn", "summary-btn"] {
            assert!(render.contains(&format!("setBusy('{id}'")), "{id}");
        }
    }
}
